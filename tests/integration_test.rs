use std::cell::RefCell;
use std::rc::Rc;

use treewalk_lang::interpreter::Interpreter;

fn run_capture(source: &str) -> Result<String, treewalk_lang::error::Error> {
    let buffer = Rc::new(RefCell::new(String::new()));
    let mut interpreter = Interpreter::with_buffer(Rc::clone(&buffer));
    treewalk_lang::run(source, &mut interpreter)?;
    Ok(buffer.borrow().clone())
}

#[test]
fn closures_preserve_environment_across_calls() {
    let out = run_capture(
        "fun makeCounter() {\n\
           var n = 0;\n\
           fun count() { n = n + 1; return n; }\n\
           return count;\n\
         }\n\
         var c = makeCounter();\n\
         print c();\n\
         print c();\n\
         print c();",
    )
    .unwrap();
    assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn inherited_method_sees_the_calling_instance_as_this() {
    let out = run_capture(
        "class A { hi() { print \"A-\" + this.name; } }\n\
         class B < A {}\n\
         var b = B();\n\
         b.name = \"x\";\n\
         b.hi();",
    )
    .unwrap();
    assert_eq!(out, "A-x\n");
}

#[test]
fn super_call_dispatches_to_the_parent_implementation() {
    let out = run_capture(
        "class A { who() { print \"A\"; } }\n\
         class B < A { who() { super.who(); print \"B\"; } }\n\
         B().who();",
    )
    .unwrap();
    assert_eq!(out, "A\nB\n");
}

#[test]
fn for_loop_desugars_and_scopes_its_initializer() {
    let out = run_capture(
        "var s = 0;\n\
         for (var i = 1; i <= 3; i = i + 1) s = s + i;\n\
         print s;",
    )
    .unwrap();
    assert_eq!(out, "6\n");
}

#[test]
fn division_by_zero_fails_before_any_output() {
    let result = run_capture("print \"before\"; print 1 / 0; print \"after\";");
    assert!(result.is_err());
}

#[test]
fn calling_with_the_wrong_number_of_arguments_is_a_runtime_error() {
    let err = run_capture("fun f(a, b) { return a + b; } f(1);").unwrap_err();
    assert!(err.to_string().contains("Expected 2 arguments but got 1"));
}

#[test]
fn bound_method_assigned_to_a_variable_keeps_its_receiver() {
    let out = run_capture(
        "class Greeter { greet() { print \"hi \" + this.name; } }\n\
         var g = Greeter();\n\
         g.name = \"sam\";\n\
         var m = g.greet;\n\
         m();",
    )
    .unwrap();
    assert_eq!(out, "hi sam\n");
}

#[test]
fn truthiness_treats_zero_and_empty_string_as_truthy() {
    let out = run_capture(
        "if (0) print \"zero-truthy\"; else print \"zero-falsy\";\n\
         if (\"\") print \"empty-truthy\"; else print \"empty-falsy\";\n\
         if (nil) print \"nil-truthy\"; else print \"nil-falsy\";",
    )
    .unwrap();
    assert_eq!(out, "zero-truthy\nempty-truthy\nnil-falsy\n");
}

#[test]
fn repl_style_sequential_runs_share_global_state() {
    let buffer = Rc::new(RefCell::new(String::new()));
    let mut interpreter = Interpreter::with_buffer(Rc::clone(&buffer));
    treewalk_lang::run("fun makeAdder(x) { fun add(y) { return x + y; } return add; }", &mut interpreter).unwrap();
    treewalk_lang::run("var add5 = makeAdder(5);", &mut interpreter).unwrap();
    treewalk_lang::run("print add5(2);", &mut interpreter).unwrap();
    assert_eq!(buffer.borrow().as_str(), "7\n");
}

#[test]
fn initializer_without_explicit_return_yields_the_instance() {
    let out = run_capture(
        "class Box { init(v) { this.v = v; } }\n\
         var b = Box(42);\n\
         print b.v;",
    )
    .unwrap();
    assert_eq!(out, "42\n");
}

#[test]
fn returning_a_value_from_an_initializer_is_a_static_error() {
    let result = run_capture("class A { init() { return 1; } }");
    assert!(result.is_err());
}
