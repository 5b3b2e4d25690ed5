#[cfg(test)]
mod session_tests {
    use pretty_assertions::assert_eq;

    use sky::error::{Diagnostic, ErrorKind, RunError};
    use sky::session::Session;
    use sky::value::Value;

    fn session() -> Session<Vec<u8>> {
        let _ = env_logger::builder().is_test(true).try_init();

        Session::with_output(Vec::new())
    }

    fn printed(session: &Session<Vec<u8>>) -> String {
        String::from_utf8_lossy(session.interpreter().output()).into_owned()
    }

    #[test]
    fn globals_persist_across_runs() {
        let mut session = session();

        session.run("var a = 1;").unwrap();
        session.run("fun bump() { a = a + 1; }").unwrap();
        session.run("bump(); bump();").unwrap();
        session.run("print a;").unwrap();

        assert_eq!(printed(&session), "3\n");
        assert_eq!(
            session.interpreter().globals().borrow().get("a", 1).unwrap(),
            Value::Number(3.0)
        );
    }

    #[test]
    fn failed_run_keeps_earlier_state() {
        let mut session = session();

        session.run("var kept = \"yes\";").unwrap();
        assert!(session.run("print missing;").is_err());
        assert!(session.run("print kept").is_err());
        session.run("print kept;").unwrap();

        assert_eq!(printed(&session), "yes\n");
    }

    #[test]
    fn definitions_before_a_runtime_error_survive() {
        let mut session = session();

        assert!(session.run("var early = 1; print nope; var late = 2;").is_err());
        session.run("print early;").unwrap();

        assert!(session.run("print late;").is_err());
        assert_eq!(printed(&session), "1\n");
    }

    #[test]
    fn lex_errors_are_all_reported_and_parsing_is_skipped() {
        let mut session = session();

        let err = session.run("print 1 $;\nprint (;\n@").unwrap_err();

        let RunError::Syntax(errors) = &err else {
            panic!("expected syntax errors, got {:?}", err);
        };

        // The broken `print (;` is never parsed, so only the two lex errors show.
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::Lex));
        assert_eq!(err.to_string(), "2 syntax error(s)");
        assert_eq!(printed(&session), "");
    }

    #[test]
    fn parse_errors_prevent_any_execution() {
        let mut session = session();

        let err = session.run("print 1;\nprint 2\nvar = 3;").unwrap_err();

        assert_eq!(
            err.diagnostics(),
            vec![Diagnostic {
                kind: ErrorKind::Parse,
                message: "at 'var': Expected ';' after value.".to_string(),
                line: 3,
            }]
        );
        assert_eq!(printed(&session), "");
    }

    #[test]
    fn resolve_errors_prevent_any_execution() {
        let mut session = session();

        let err = session
            .run("print 1;\nfun f() {\n  var x = x;\n}\n{ var y = y; }")
            .unwrap_err();

        assert_eq!(
            err.diagnostics(),
            vec![
                Diagnostic {
                    kind: ErrorKind::Resolve,
                    message: "at 'x': Cannot read local variable in its own initializer."
                        .to_string(),
                    line: 3,
                },
                Diagnostic {
                    kind: ErrorKind::Resolve,
                    message: "at 'y': Cannot read local variable in its own initializer."
                        .to_string(),
                    line: 5,
                },
            ]
        );
        assert_eq!(printed(&session), "");
    }

    #[test]
    fn closures_from_earlier_runs_keep_their_bindings() {
        let mut session = session();

        session
            .run("fun make() { var n = 0; fun next() { n = n + 1; return n; } return next; }")
            .unwrap();
        session.run("var next = make();").unwrap();
        session.run("next(); var n = 100;").unwrap();
        session.run("print next();").unwrap();

        assert_eq!(printed(&session), "2\n");
    }

    #[test]
    fn runtime_error_diagnostic() {
        let mut session = session();

        let err = session.run("print 1;\nprint -nil;").unwrap_err();

        assert!(matches!(err, RunError::Runtime(_)));
        assert_eq!(
            err.diagnostics(),
            vec![Diagnostic {
                kind: ErrorKind::Runtime,
                message: "Operand of '-' must be a number, got nil.".to_string(),
                line: 2,
            }]
        );
        assert_eq!(printed(&session), "1\n");
    }

    #[test]
    fn diagnostics_serialize_as_json() {
        let mut session = session();

        let err = session.run("x;").unwrap_err();
        let json = serde_json::to_string(&err.diagnostics()[0]).unwrap();

        assert_eq!(
            json,
            r#"{"kind":"runtime","message":"Undefined variable 'x'.","line":1}"#
        );
    }

    #[test]
    fn independent_sessions_share_nothing() {
        let mut first = session();
        let mut second = session();

        first.run("var only_here = true;").unwrap();

        assert!(second.run("print only_here;").is_err());
        first.run("print only_here;").unwrap();
        assert_eq!(printed(&first), "true\n");
    }
}
