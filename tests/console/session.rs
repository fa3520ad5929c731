use opcore::console::{BracketState, Readiness};

fn run(lines: &[&str]) -> (Vec<String>, Vec<String>) {
    let mut st = BracketState::new();
    let mut executed = Vec::new();
    let mut errors = Vec::new();
    for l in lines {
        match st.update(l) {
            Readiness::Execute(s) => executed.push(s),
            Readiness::Malformed(e) => errors.push(e),
            Readiness::Continue => {}
        }
    }
    (executed, errors)
}

#[test]
fn mixed_session() {
    let (executed, errors) = run(&[
        "local.a",
        "{",
        "  k = \"}\"",
        "}",
        "]",
        "/* a",
        "comment */ 1",
        "2 + \\",
        "3",
    ]);
    assert_eq!(
        executed,
        vec![
            "local.a".to_string(),
            "{\n  k = \"}\"\n}".to_string(),
            "/* a\ncomment */ 1".to_string(),
            "2 + \n3".to_string(),
        ]
    );
    assert_eq!(errors.len(), 1);
}
