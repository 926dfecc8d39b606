use std::fs;

use rbcst::{load_options, parse_file, parse_target, NodeKind, ParseOptions, RbcstError};

fn write(dir: &std::path::Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, content).expect("write file");
}

#[test]
fn directory_target_reads_only_top_level_ruby_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "b.rb", "puts 2\n");
    write(dir.path(), "a.rb", "puts 1\n");
    write(dir.path(), "notes.txt", "not ruby");
    write(dir.path(), "lib/deep.rb", "class Deep; end\n");

    let target = dir.path().display().to_string();
    let bundle = parse_target(&target, &ParseOptions::default()).expect("bundle");
    let names: Vec<String> = bundle
        .files
        .iter()
        .map(|file| file.path.rsplit(['/', '\\']).next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["a.rb", "b.rb"]);
}

#[test]
fn recursive_target_walks_subdirectories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.rb", "puts 1\n");
    write(dir.path(), "lib/deep.rb", "class Deep; end\n");
    write(dir.path(), "lib/skip.md", "# readme");

    let target = format!("{}/...", dir.path().display());
    let bundle = parse_target(&target, &ParseOptions::default()).expect("bundle");
    assert_eq!(bundle.files.len(), 2);
    let deep = bundle
        .files
        .iter()
        .find(|file| file.path.ends_with("deep.rb"))
        .expect("deep.rb");
    assert!(!deep.has_errors);
    assert_eq!(deep.line_count, 1);
    assert!(deep.root.find_first(NodeKind::Class).is_some());
}

#[test]
fn file_records_its_diagnostics() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "broken.rb", "def broken\n  1 +\nend\n");

    let file = parse_file(&dir.path().join("broken.rb"), &ParseOptions::default()).expect("file");
    assert!(file.has_errors);
    assert_eq!(file.byte_count, "def broken\n  1 +\nend\n".len());
    assert_eq!(file.diagnostics.len(), 1);
    let diag = &file.diagnostics[0];
    assert_eq!(diag.code, "E1502");
    assert_eq!(diag.span.start.line, 3);
    assert_eq!(diag.labels[0].span.start.line, 2);
}

#[test]
fn bundle_serializes_to_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "one.rb", "x = 1\n");

    let target = dir.path().join("one.rb").display().to_string();
    let bundle = parse_target(&target, &ParseOptions::default()).expect("bundle");
    let json: serde_json::Value = serde_json::to_value(&bundle).expect("json");
    let file = &json["files"][0];
    assert_eq!(file["root"]["kind"], "program");
    assert_eq!(file["has_errors"], false);
    assert_eq!(file["root"]["children"][0]["kind"], "assignment");
}

#[test]
fn missing_and_empty_targets_are_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nowhere").display().to_string();
    assert!(matches!(
        parse_target(&missing, &ParseOptions::default()),
        Err(RbcstError::InvalidPath(_))
    ));

    write(dir.path(), "readme.md", "nothing to parse");
    let empty = dir.path().display().to_string();
    assert!(matches!(
        parse_target(&empty, &ParseOptions::default()),
        Err(RbcstError::InvalidPath(_))
    ));
}

#[test]
fn nesting_ceiling_surfaces_as_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "deep.rb", &format!("{}1{}", "(".repeat(30), ")".repeat(30)));

    let options = ParseOptions::default().with_max_depth(4);
    let err = parse_file(&dir.path().join("deep.rb"), &options).expect_err("too deep");
    assert!(matches!(err, RbcstError::Parse { .. }));
    assert!(err.to_string().contains("deep.rb"));
}

#[test]
fn options_load_from_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "rbcst.toml", "[parse]\nmax_depth = 32\n");
    let options = load_options(&dir.path().join("rbcst.toml")).expect("options");
    assert_eq!(options.max_depth, 32);

    write(dir.path(), "bad.toml", "[parse]\nmax_depth = \"deep\"\n");
    assert!(matches!(
        load_options(&dir.path().join("bad.toml")),
        Err(RbcstError::Options(_))
    ));
}
