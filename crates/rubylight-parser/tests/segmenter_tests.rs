use rubylight_parser::lexer::TokenKind;
use rubylight_parser::{segment, Statement, StatementSegmenter};

fn header_text(statement: &Statement) -> String {
    statement.header_source()
}

#[test]
fn test_segmentation_count_matches_top_level_constructs() {
    let source = "require 'set'\n\nclass A\n  def m\n  end\nend\n\nmodule B\nend\n\nFOO = 1\n\ndef helper(x)\n  x * 2\nend\n";
    let statements = segment(source);
    assert_eq!(statements.len(), 5);
    for statement in &statements {
        let first = statement.header.first().unwrap();
        let last = statement.header.last().unwrap();
        assert!(!first.kind.is_trivia());
        assert!(!last.kind.is_trivia());
        assert!(statement.header.iter().all(|t| t.kind != TokenKind::Newline));
    }
}

#[test]
fn test_segmentation_is_idempotent() {
    let source = "# Outer docs\nmodule Outer\n  # Inner docs\n  class Inner < Base\n    attr_reader :a\n  end\nend\n";
    let first: Vec<Statement> = segment(source);
    let second: Vec<Statement> = segment(source);
    assert_eq!(first, second);
    assert_eq!(first[0].leading_comment.as_deref(), Some("Outer docs"));
    assert_eq!(
        first[0].statements()[0].leading_comment.as_deref(),
        Some("Inner docs")
    );
}

#[test]
fn test_nested_body_contains_single_method() {
    let statements = segment("class A\n def m\n end\nend");
    assert_eq!(statements.len(), 1);
    let body = statements[0].body.as_ref().unwrap();
    assert_eq!(body.len(), 1);
    assert_eq!(header_text(&body[0]), "def m");
    assert_eq!(body[0].body.as_ref().map(Vec::len), Some(0));
}

#[test]
fn test_blank_line_between_comments_resets() {
    let statements = segment("# first\n\n# second\ndef m; end");
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].leading_comment.as_deref(), Some("second"));
}

#[test]
fn test_malformed_input_makes_progress() {
    let source = "end\n)\nclass Broken\n  def x(\nend\ndef after; end\n";
    let statements = segment(source);
    assert!(!statements.is_empty());
    assert!(statements.iter().all(|s| !s.header.is_empty()));
}

#[test]
fn test_modifier_does_not_open_block() {
    let statements = segment("retry_count += 1 while pending?\nputs 'done'\n");
    assert_eq!(statements.len(), 2);
    assert!(statements.iter().all(|s| !s.is_block()));
}

#[test]
fn test_lazy_iteration() {
    let mut segmenter = StatementSegmenter::new("module A; end\nmodule B; end\n");
    assert_eq!(segmenter.next().map(|s| header_text(&s)), Some("module A".to_string()));
    assert_eq!(segmenter.next().map(|s| header_text(&s)), Some("module B".to_string()));
    assert!(segmenter.next().is_none());
}

#[test]
fn test_modifiers_after_flow_keywords_keep_nesting() {
    let source = "class A\n  def m(x)\n    return if x\n    next unless x\n    break while x\n    1\n  end\n\n  def n; end\nend\n\nclass B; end\n";
    let statements = segment(source);
    let top: Vec<String> = statements.iter().map(header_text).collect();
    assert_eq!(top, vec!["class A", "class B"]);
    let members: Vec<String> = statements[0].statements().iter().map(header_text).collect();
    assert_eq!(members, vec!["def m(x)", "def n"]);
    assert_eq!(statements[0].statements()[0].statements().len(), 4);
}

#[test]
fn test_modifiers_after_self_and_closing_paren() {
    let statements = segment("self if ready?\nfoo(1) unless done\n[a, b] while more\nlast\n");
    assert_eq!(statements.len(), 4);
    assert!(statements.iter().all(|s| !s.is_block()));
}
