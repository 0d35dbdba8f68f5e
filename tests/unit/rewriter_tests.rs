//! Unit tests for the full-text rewrite engine

use fulltext_interceptor::{
    rewrite_full_text_query, DbCommand, DbParameter, DbType, FullTextError, FullTextRewriter,
    FullTextTag, MalformedSqlReason, ParameterValue,
};
use pretty_assertions::assert_eq;

use crate::common::{tagged_command, TITLE_SEARCH_SQL, WILDCARD_SEARCH_SQL};

fn rewrite(command: &mut DbCommand) -> Result<(), FullTextError> {
    FullTextRewriter::new().rewrite(command).map(|_| ())
}

// ============================================================================
// Untagged Commands
// ============================================================================

#[test]
fn test_untagged_command_unchanged() {
    let mut command = DbCommand::new(TITLE_SEARCH_SQL)
        .with_parameter(DbParameter::text("p__linq__0", "%rust%").with_size(4000));
    let before = command.clone();

    let summary = FullTextRewriter::new().rewrite(&mut command).unwrap();

    assert!(summary.is_empty());
    assert_eq!(command, before);
}

#[test]
fn test_non_text_and_db_null_parameters_skipped() {
    let mut command = DbCommand::new(
        "SELECT * FROM [dbo].[Posts] AS [Extent1] WHERE [Extent1].[AuthorId] = @p0 AND [Extent1].[Title] LIKE @p1 ESCAPE N'~'",
    )
    .with_parameter(DbParameter::new("p0", DbType::Int32, 7i64))
    .with_parameter(DbParameter::new("p1", DbType::String, ParameterValue::DbNull));
    let before = command.clone();

    rewrite(&mut command).unwrap();

    assert_eq!(command, before);
}

#[test]
fn test_tag_in_non_textual_parameter_ignored() {
    // Xml parameters are not character data as far as the rewriter is concerned
    let mut command = DbCommand::new(TITLE_SEARCH_SQL).with_parameter(DbParameter::new(
        "p__linq__0",
        DbType::Xml,
        FullTextTag::Contains.wrap("rust").as_str(),
    ));
    let before = command.clone();

    rewrite(&mut command).unwrap();

    assert_eq!(command, before);
}

// ============================================================================
// Single Column Shape
// ============================================================================

#[test]
fn test_contains_single_column() {
    let mut command = tagged_command(TITLE_SEARCH_SQL, FullTextTag::Contains, "rust");

    rewrite(&mut command).unwrap();

    assert!(command
        .text
        .contains("WHERE CONTAINS([Extent1].[Title], @p__linq__0)"));
    assert!(!command.text.contains("LIKE"));
    let param = &command.parameters[0];
    assert_eq!(param.value, ParameterValue::Text("rust".to_string()));
    assert_eq!(param.size, 4096);
    assert_eq!(param.db_type, DbType::AnsiStringFixedLength);
}

#[test]
fn test_freetext_single_column() {
    let mut command = tagged_command(TITLE_SEARCH_SQL, FullTextTag::FreeText, "rust");

    rewrite(&mut command).unwrap();

    assert!(command
        .text
        .contains("WHERE FREETEXT([Extent1].[Title], @p__linq__0)"));
    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text("rust".to_string())
    );
}

#[test]
fn test_short_parameter_names() {
    let mut command = DbCommand::new("SELECT * FROM [T] WHERE [T].[C] LIKE @p0 ESCAPE '~'")
        .with_parameter(DbParameter::text("p0", &FullTextTag::Contains.wrap("term")));

    rewrite(&mut command).unwrap();

    assert_eq!(command.text, "SELECT * FROM [T] WHERE CONTAINS([T].[C], @p0)");
    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text("term".to_string())
    );
}

#[test]
fn test_rest_of_text_preserved() {
    let sql = "SELECT [Extent1].[Id] FROM [dbo].[Posts] AS [Extent1] WHERE ([Extent1].[Published] = 1) AND ([Extent1].[Body] LIKE @p__linq__0 ESCAPE N'~') ORDER BY [Extent1].[Id] DESC";
    let mut command = tagged_command(sql, FullTextTag::Contains, "\"sql*\"");

    rewrite(&mut command).unwrap();

    assert_eq!(
        command.text,
        "SELECT [Extent1].[Id] FROM [dbo].[Posts] AS [Extent1] WHERE ([Extent1].[Published] = 1) AND (CONTAINS([Extent1].[Body], @p__linq__0)) ORDER BY [Extent1].[Id] DESC"
    );
    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text("\"sql*\"".to_string())
    );
}

#[test]
fn test_bracket_in_earlier_string_literal_untouched() {
    let sql = "SELECT * FROM [dbo].[Posts] AS [Extent1] WHERE [Extent1].[Code] = N'a[b' AND [Extent1].[Title] LIKE @p0 ESCAPE N'~'";
    let mut command = DbCommand::new(sql)
        .with_parameter(DbParameter::text("p0", &FullTextTag::Contains.wrap("rust")));

    rewrite(&mut command).unwrap();

    assert_eq!(
        command.text,
        "SELECT * FROM [dbo].[Posts] AS [Extent1] WHERE [Extent1].[Code] = N'a[b' AND CONTAINS([Extent1].[Title], @p0)"
    );
}

// ============================================================================
// Wildcard Shape
// ============================================================================

#[test]
fn test_contains_wildcard() {
    let mut command = tagged_command(WILDCARD_SEARCH_SQL, FullTextTag::Contains, "rust");

    rewrite(&mut command).unwrap();

    assert!(command.text.ends_with("WHERE CONTAINS(*, @p__linq__0)"));
}

#[test]
fn test_freetext_wildcard() {
    let mut command = tagged_command(WILDCARD_SEARCH_SQL, FullTextTag::FreeText, "rust");

    rewrite(&mut command).unwrap();

    assert!(command.text.ends_with("WHERE FREETEXT(*, @p__linq__0)"));
}

#[test]
fn test_wildcard_preferred_over_column() {
    let sql = "SELECT * FROM [dbo].[Posts] AS [Extent1] WHERE N'*' LIKE @p0 ESCAPE N'~' OR [Extent1].[Title] LIKE @p0 ESCAPE N'~'";
    let mut command = DbCommand::new(sql)
        .with_parameter(DbParameter::text("p0", &FullTextTag::Contains.wrap("x")));

    let summary = FullTextRewriter::new().rewrite(&mut command).unwrap();

    assert_eq!(
        summary.rewritten[0].shape,
        fulltext_interceptor::rewriter::FragmentShape::Wildcard
    );
    assert!(command.text.contains("CONTAINS(*, @p0)"));
    assert!(command.text.contains("[Extent1].[Title] LIKE @p0 ESCAPE N'~'"));
}

// ============================================================================
// Value Unescaping
// ============================================================================

#[test]
fn test_embedded_tag_literal_preserved() {
    let term = "find -FTSCONTAINS- literally";
    let mut command = tagged_command(TITLE_SEARCH_SQL, FullTextTag::Contains, term);

    rewrite(&mut command).unwrap();

    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text(term.to_string())
    );
}

#[test]
fn test_embedded_full_tag_pair_preserved() {
    let term = "-FTSFREETEXT-%inner%-/FTSFREETEXT-";
    let mut command = tagged_command(TITLE_SEARCH_SQL, FullTextTag::Contains, term);

    rewrite(&mut command).unwrap();

    assert!(command.text.contains("CONTAINS([Extent1].[Title]"));
    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text(term.to_string())
    );
}

#[test]
fn test_tag_inside_translator_wildcards() {
    let mut command = DbCommand::new(TITLE_SEARCH_SQL).with_parameter(DbParameter::text(
        "p__linq__0",
        "%-FTSCONTAINS-rust-/FTSCONTAINS-%",
    ));

    rewrite(&mut command).unwrap();

    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text("rust".to_string())
    );
}

#[test]
fn test_ansi_string_parameter_rewritten() {
    let mut command = DbCommand::new(TITLE_SEARCH_SQL).with_parameter(
        DbParameter::new(
            "p__linq__0",
            DbType::AnsiString,
            FullTextTag::Contains.wrap("rust").as_str(),
        )
        .with_size(8000),
    );

    rewrite(&mut command).unwrap();

    assert_eq!(command.parameters[0].size, 4096);
    assert_eq!(command.parameters[0].db_type, DbType::AnsiStringFixedLength);
}

// ============================================================================
// Multiple Parameters
// ============================================================================

#[test]
fn test_two_tagged_parameters_independent() {
    let sql = "SELECT * FROM [dbo].[Posts] AS [Extent1] WHERE ([Extent1].[Title] LIKE @p__linq__0 ESCAPE N'~') AND ([Extent1].[Body] LIKE @p__linq__1 ESCAPE N'~')";
    let mut command = DbCommand::new(sql)
        .with_parameter(DbParameter::text(
            "p__linq__0",
            &FullTextTag::Contains.wrap("rust"),
        ))
        .with_parameter(DbParameter::text(
            "p__linq__1",
            &FullTextTag::FreeText.wrap("memory safety"),
        ));

    let summary = FullTextRewriter::new().rewrite(&mut command).unwrap();

    assert_eq!(
        command.text,
        "SELECT * FROM [dbo].[Posts] AS [Extent1] WHERE (CONTAINS([Extent1].[Title], @p__linq__0)) AND (FREETEXT([Extent1].[Body], @p__linq__1))"
    );
    let names: Vec<&str> = summary.rewritten.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["p__linq__0", "p__linq__1"]);
    assert_eq!(
        command.parameters[1].value,
        ParameterValue::Text("memory safety".to_string())
    );
}

#[test]
fn test_prefix_named_parameters_do_not_collide() {
    let sql = "WHERE [a].[x] LIKE @p1 ESCAPE N'~' AND [a].[y] LIKE @p10 ESCAPE N'~'";
    let mut command = DbCommand::new(sql)
        .with_parameter(DbParameter::text("p1", &FullTextTag::Contains.wrap("one")))
        .with_parameter(DbParameter::text("p10", &FullTextTag::FreeText.wrap("ten")));

    rewrite(&mut command).unwrap();

    assert_eq!(
        command.text,
        "WHERE CONTAINS([a].[x], @p1) AND FREETEXT([a].[y], @p10)"
    );
}

#[test]
fn test_tagged_and_plain_parameters_mixed() {
    let sql = "WHERE [a].[x] LIKE @p0 ESCAPE N'~' AND [a].[y] LIKE @p1 ESCAPE N'~'";
    let mut command = DbCommand::new(sql)
        .with_parameter(DbParameter::text("p0", "%plain%"))
        .with_parameter(DbParameter::text("p1", &FullTextTag::Contains.wrap("tagged")));

    rewrite(&mut command).unwrap();

    assert_eq!(
        command.text,
        "WHERE [a].[x] LIKE @p0 ESCAPE N'~' AND CONTAINS([a].[y], @p1)"
    );
    assert_eq!(
        command.parameters[0].value,
        ParameterValue::Text("%plain%".to_string())
    );
    assert_eq!(command.parameters[0].db_type, DbType::String);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unmatched_fragment_fails() {
    let mut command = tagged_command(
        "SELECT * FROM [dbo].[Posts] WHERE [Title] = @p__linq__0",
        FullTextTag::Contains,
        "rust",
    );
    let before = command.clone();

    let err = rewrite(&mut command).unwrap_err();

    assert_eq!(
        err,
        FullTextError::MalformedSql {
            parameter: "p__linq__0".to_string(),
            reason: MalformedSqlReason::NoMatchingFragment,
        }
    );
    assert!(err.to_string().contains("Malformed full-text SQL"));
    assert_eq!(command, before);
}

#[test]
fn test_absent_command_fails() {
    let err = rewrite_full_text_query(None).unwrap_err();

    assert_eq!(
        err,
        FullTextError::InvalidArgument {
            argument: "command"
        }
    );
}

#[test]
fn test_default_rewriter_entry_point() {
    let mut command = tagged_command(WILDCARD_SEARCH_SQL, FullTextTag::FreeText, "rust");

    let summary = rewrite_full_text_query(Some(&mut command)).unwrap();

    assert_eq!(summary.len(), 1);
    assert!(command.text.contains("FREETEXT(*, @p__linq__0)"));
}

// ============================================================================
// Repeated Calls
// ============================================================================

#[test]
fn test_second_rewrite_is_noop() {
    let rewriter = FullTextRewriter::new();
    let mut command = tagged_command(TITLE_SEARCH_SQL, FullTextTag::Contains, "rust");
    rewriter.rewrite(&mut command).unwrap();
    let once = command.clone();

    let summary = rewriter.rewrite(&mut command).unwrap();

    assert!(summary.is_empty());
    assert_eq!(command, once);
}

#[test]
fn test_rewriter_shared_across_threads() {
    let rewriter = FullTextRewriter::new();

    std::thread::scope(|scope| {
        for i in 0..4 {
            let rewriter = &rewriter;
            scope.spawn(move || {
                let term = format!("term{}", i);
                let mut command = tagged_command(TITLE_SEARCH_SQL, FullTextTag::Contains, &term);
                rewriter.rewrite(&mut command).unwrap();
                assert_eq!(command.parameters[0].value, ParameterValue::Text(term));
            });
        }
    });
}
