#[cfg(test)]
mod interpreter_tests {
    use std::io::{self, Write};

    use pretty_assertions::assert_eq;

    use sky::error::{ErrorKind, RunError, SkyError};
    use sky::interpreter::{Flow, Interpreter, DEFAULT_CALL_LIMIT};
    use sky::session::{self, Session};
    use sky::value::Value;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Run `source` in a fresh session, returning printed output and outcome.
    fn run(source: &str) -> (String, Result<(), RunError>) {
        init_logger();

        let mut session = Session::with_output(Vec::new());
        let result = session.run(source);
        let output = String::from_utf8(session.into_interpreter().into_output())
            .expect("output is UTF-8");

        (output, result)
    }

    fn output_of(source: &str) -> String {
        let (output, result) = run(source);

        if let Err(e) = result {
            panic!("unexpected failure: {:?}\noutput so far:\n{}", e, output);
        }

        output
    }

    fn runtime_error(source: &str) -> (String, SkyError) {
        match run(source) {
            (output, Err(RunError::Runtime(e))) => (output, e),
            (output, other) => panic!("expected runtime error, got {:?} / {:?}", other, output),
        }
    }

    #[test]
    fn precedence_is_honoured() {
        assert_eq!(output_of("print 1 + 2 * 3;"), "7\n");
        assert_eq!(output_of("print (1 + 2) * 3;"), "9\n");
        assert_eq!(output_of("print 10 - 4 - 3;"), "3\n");
        assert_eq!(output_of("print -2 * 3 + 1;"), "-5\n");
        assert_eq!(output_of("print 7 / 2;"), "3.5\n");
    }

    #[test]
    fn evaluate_single_expression() {
        init_logger();

        let program = session::parse("1 + 2 * 3;").unwrap();
        let sky::stmt::Stmt::Expression(expr) = &program[0] else {
            panic!("expected expression statement");
        };

        let mut interpreter = Interpreter::with_output(Vec::new());
        assert_eq!(interpreter.evaluate(expr).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn strings_and_equality() {
        assert_eq!(output_of("print \"foo\" + \"bar\";"), "foobar\n");
        assert_eq!(output_of("print \"a\" == \"a\";"), "true\n");
        assert_eq!(output_of("print 1 == \"1\";"), "false\n");
        assert_eq!(output_of("print nil == nil;"), "true\n");
        assert_eq!(output_of("print nil == false;"), "false\n");
        assert_eq!(output_of("print 3 != 4;"), "true\n");
        assert_eq!(output_of("print \"apple\" < \"banana\";"), "true\n");
        assert_eq!(output_of("print 2 >= 2;"), "true\n");
    }

    #[test]
    fn truthiness_and_logical_operators() {
        assert_eq!(output_of("print !nil;"), "true\n");
        assert_eq!(output_of("print !0;"), "false\n");
        assert_eq!(output_of("print nil or \"yes\";"), "yes\n");
        assert_eq!(output_of("print 0 and \"zero is truthy\";"), "zero is truthy\n");
        assert_eq!(output_of("print false and undefined;"), "false\n");
        assert_eq!(output_of("print true or undefined;"), "true\n");
        assert_eq!(output_of("if (\"\") print 1; else print 2;"), "1\n");
    }

    #[test]
    fn var_without_initializer_is_nil() {
        assert_eq!(output_of("var a; print a;"), "nil\n");
    }

    #[test]
    fn shadowing_in_blocks() {
        assert_eq!(
            output_of("var x = 1; { var x = 2; print x; } print x;"),
            "2\n1\n"
        );
    }

    #[test]
    fn assignment_reaches_enclosing_scope() {
        assert_eq!(
            output_of("var x = 1; { x = 2; var y = x = 3; print y; } print x;"),
            "3\n3\n"
        );
    }

    #[test]
    fn redeclaring_in_same_scope_overwrites() {
        assert_eq!(output_of("var a = 1; var a = 2; print a;"), "2\n");
    }

    #[test]
    fn closures_capture_by_reference() {
        let source = r#"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }

            var counter = makeCounter();
            print counter();
            print counter();

            var other = makeCounter();
            print other();
            print counter();
        "#;

        assert_eq!(output_of(source), "1\n2\n1\n3\n");
    }

    #[test]
    fn closures_see_later_writes_to_captured_variables() {
        let source = r#"
            var shown = "before";
            fun show() { print shown; }
            shown = "after";
            show();
        "#;

        assert_eq!(output_of(source), "after\n");
    }

    #[test]
    fn closures_bind_the_scope_they_were_written_in() {
        let source = r#"
            var a = "global";
            {
                fun show() { print a; }
                show();
                var a = "block";
                show();
            }
        "#;

        assert_eq!(output_of(source), "global\nglobal\n");
    }

    #[test]
    fn assignment_in_closure_targets_the_captured_binding() {
        let source = r#"
            var x = "global";
            fun outer() {
                var x = "outer";
                fun set() { x = "set"; }
                {
                    var x = "shadow";
                    set();
                    print x;
                }
                print x;
            }
            outer();
            print x;
        "#;

        assert_eq!(output_of(source), "shadow\nset\nglobal\n");
    }

    #[test]
    fn local_redeclaration_overwrites() {
        assert_eq!(
            output_of("{ var a = 1; var a = a + 1; print a; }"),
            "2\n"
        );
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_rejected() {
        let (output, result) = run("print 0;\n{\n  var a = a;\n}");

        let errors = match result {
            Err(RunError::Syntax(errors)) => errors,
            other => panic!("expected a resolve error, got {:?}", other),
        };

        assert_eq!(output, "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Resolve);
        assert_eq!(
            errors[0].to_string(),
            "[line 3] Error at 'a': Cannot read local variable in its own initializer."
        );

        // At top level the initializer reads the global, which is allowed.
        let (_, err) = runtime_error("var b = b;");
        assert!(err.to_string().contains("Undefined variable 'b'."));
    }

    #[test]
    fn lambdas_are_first_class() {
        let source = r#"
            fun twice(f, x) { return f(f(x)); }
            print twice(fun (n) { return n * 3; }, 2);
            var noop = fun () {};
            print noop();
            print noop;
        "#;

        assert_eq!(output_of(source), "18\nnil\n<fn lambda>\n");
    }

    #[test]
    fn recursion() {
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        "#;

        assert_eq!(output_of(source), "610\n");
    }

    #[test]
    fn function_values_display() {
        assert_eq!(output_of("fun f() {} print f;"), "<fn f>\n");
        assert_eq!(output_of("print clock;"), "<native fn clock>\n");
    }

    #[test]
    fn clock_returns_seconds() {
        assert_eq!(output_of("print clock() > 1000000000;"), "true\n");
    }

    #[test]
    fn while_and_for_loops() {
        assert_eq!(
            output_of("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
        assert_eq!(
            output_of("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn for_loop_variable_is_scoped_to_the_loop() {
        let (_, err) = runtime_error("for (var i = 0; i < 1; i = i + 1) {} print i;");

        assert!(err.to_string().contains("Undefined variable 'i'."));
    }

    #[test]
    fn break_and_continue() {
        let source = r#"
            for (var i = 0; i < 10; i = i + 1) {
                if (i == 1) continue;
                if (i == 4) break;
                print i;
            }
            var n = 0;
            while (true) {
                n = n + 1;
                if (n < 3) continue;
                break;
            }
            print n;
        "#;

        assert_eq!(output_of(source), "0\n2\n3\n3\n");
    }

    #[test]
    fn return_unwinds_loops_and_blocks() {
        let source = r#"
            fun find() {
                for (var i = 0; ; i = i + 1) {
                    while (true) {
                        { if (i == 2) return i; }
                        break;
                    }
                }
            }
            print find();
        "#;

        assert_eq!(output_of(source), "2\n");
    }

    #[test]
    fn dangling_else_binds_to_inner_if() {
        let program = |a: &str, b: &str| {
            format!(
                "var a = {}; var b = {}; if (a) if (b) print 1; else print 2;",
                a, b
            )
        };

        // With `a` false the whole inner if is skipped: the else is not the outer one's.
        assert_eq!(output_of(&program("false", "false")), "");
        assert_eq!(output_of(&program("true", "false")), "2\n");
        assert_eq!(output_of(&program("true", "true")), "1\n");
    }

    #[test]
    fn undefined_variable_names_variable_and_line() {
        let (_, err) = runtime_error("var x = 1;\n\nprint y;");

        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.to_string(), "Undefined variable 'y'.\n[line 3]");
    }

    #[test]
    fn assigning_undeclared_variable_fails() {
        let (_, err) = runtime_error("z = 1;");

        assert!(err.to_string().contains("Undefined variable 'z'."));
    }

    #[test]
    fn arity_mismatch_is_checked_before_the_body_runs() {
        let source = "fun f() { print \"body ran\"; }\nprint \"before\";\nf(1);";
        let (output, err) = runtime_error(source);

        assert_eq!(output, "before\n");
        assert_eq!(err.line(), Some(3));
        assert!(err.to_string().contains("Expected 0 arguments but got 1."));
    }

    #[test]
    fn calling_a_non_callable_fails() {
        let (_, err) = runtime_error("var s = \"text\"; s();");

        assert!(err.to_string().contains("Can only call functions, got string."));
    }

    #[test]
    fn type_mismatch_names_operator_and_operands() {
        let (_, err) = runtime_error("print 1 + \"a\";");
        assert_eq!(
            err.to_string(),
            "Operands of '+' must be two numbers or two strings, got number and string.\n[line 1]"
        );

        let (_, err) = runtime_error("print \"a\" * 2;");
        assert!(err.to_string().contains("Operands of '*' must be numbers, got string and number."));

        let (_, err) = runtime_error("print -\"a\";");
        assert!(err.to_string().contains("Operand of '-' must be a number, got string."));

        let (_, err) = runtime_error("print true < 1;");
        assert!(err.to_string().contains("'<'"));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (_, err) = runtime_error("print 1 / 0;");

        assert!(err.to_string().contains("Division by zero."));
    }

    #[test]
    fn return_at_top_level_is_a_runtime_error() {
        let (output, err) = runtime_error("print 1;\nreturn 2;\nprint 3;");

        assert_eq!(output, "1\n");
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("Can't return from top-level code."));
    }

    #[test]
    fn first_runtime_error_stops_the_run() {
        let (output, _) = runtime_error("print 1; print nope; print 2;");

        assert_eq!(output, "1\n");
    }

    #[test]
    fn deep_recursion_reports_stack_overflow() {
        init_logger();

        let interpreter = Interpreter::with_output(Vec::new()).with_call_limit(16);
        let mut session = Session::with_interpreter(interpreter);

        let err = session
            .run("fun down(n) { return down(n + 1); } down(0);")
            .unwrap_err();

        assert!(err.to_string().contains("Stack overflow."));

        // The interpreter is usable again afterwards.
        session
            .run("fun up(n) { if (n == 0) return 0; return up(n - 1); } print up(10);")
            .unwrap();
        let output = String::from_utf8(session.into_interpreter().into_output()).unwrap();
        assert_eq!(output, "0\n");
    }

    #[test]
    fn recursion_close_to_the_default_limit_succeeds() {
        let program = |n: usize| {
            format!(
                "fun down(n) {{ if (n > 0) {{ return down(n - 1); }} return 0; }} print down({});",
                n
            )
        };

        assert_eq!(output_of(&program(DEFAULT_CALL_LIMIT - 5)), "0\n");

        let (_, err) = runtime_error(&program(DEFAULT_CALL_LIMIT + 10));
        assert!(err.to_string().contains("Stack overflow."));
    }

    #[test]
    fn deeply_nested_expressions_evaluate() {
        let source = format!("print {}1{};", "(".repeat(500), ")".repeat(500));
        assert_eq!(output_of(&source), "1\n");

        let source = format!("print {}1;", "-".repeat(400));
        assert_eq!(output_of(&source), "1\n");
    }

    #[test]
    fn large_numbers_print_in_exponent_form() {
        assert_eq!(output_of("print 1000000 * 1000000 * 1000;"), "1e15\n");
        assert_eq!(output_of("print 1000000 * 1000000;"), "1000000000000\n");
    }

    /// Accepts writes but refuses to flush.
    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("flush failed"))
        }
    }

    #[test]
    fn runtime_error_wins_over_flush_failure() {
        init_logger();

        let mut session = Session::with_output(FlushFails(Vec::new()));

        match session.run("print 1; print nope;") {
            Err(RunError::Runtime(e)) => {
                assert_eq!(e.kind(), ErrorKind::Runtime);
                assert!(e.to_string().contains("Undefined variable 'nope'."));
            }
            other => panic!("expected runtime error, got {:?}", other),
        }

        match session.run("print 2;") {
            Err(RunError::Runtime(e)) => assert_eq!(e.kind(), ErrorKind::Io),
            other => panic!("expected flush failure, got {:?}", other),
        }

        assert_eq!(session.interpreter().output().0, b"1\n2\n");
    }

    #[test]
    fn execute_reports_control_flow() {
        init_logger();

        let mut interpreter = Interpreter::with_output(Vec::new());
        let program = session::parse("while (true) break; { print 1; }").unwrap();

        assert_eq!(interpreter.execute(&program[0]).unwrap(), Flow::Normal);
        assert_eq!(interpreter.execute(&program[1]).unwrap(), Flow::Normal);
    }
}
