// tests/tools.rs
use covgather::config::RunConfig;
use covgather::tools::{
    CoberturaXml, CoverageTool, GcovJson, GcovText, LlvmExport, Tool, guess_tool,
    parse_version_banner,
};
use covgather::types::{Error, FunctionDecl, LineDecl, ToolFamily};
use flate2::Compression;
use flate2::write::GzEncoder;
use indoc::indoc;
use rstest::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

#[fixture]
fn gcov_text() -> GcovText {
    GcovText::new(Path::new("gcov"), Path::new("/build"), Path::new("/int"))
}

#[fixture]
fn gcov_json() -> GcovJson {
    GcovJson::new(Path::new("gcov"), Path::new("/build"), Path::new("/int"))
}

#[fixture]
fn llvm_export() -> LlvmExport {
    LlvmExport::new(
        Path::new("llvm-cov"),
        Path::new("llvm-profdata"),
        "app",
        Path::new("/build"),
        Path::new("/int"),
    )
}

#[rstest]
fn test_gcov_text_records(gcov_text: GcovText) {
    // Setup
    let text = indoc! {"
        version:8.4.0
        file:/src/proj/a.c
        function:3,7,2,main
        function:9,x,1,broken
        lcount:3,2,0
        lcount:4,0,1
        lcount:0,1,0
        lcount:5,oops,0
        branch:4,taken
        file:rel/b.c
        lcount:1,1,0
    "};

    // Execute
    let files = gcov_text.parse_text(text);

    // Verify
    assert_eq!(files.len(), 2);

    let a = &files[Path::new("/src/proj/a.c")];
    assert_eq!(
        a.functions,
        vec![FunctionDecl {
            start_line: Some(3),
            end_line: Some(7),
            execution_count: Some(2),
            name: Some("main".to_string()),
            ..Default::default()
        }]
    );
    assert_eq!(
        a.lines,
        vec![
            LineDecl::new(3, 2, Some(false)),
            LineDecl::new(4, 0, Some(true)),
        ]
    );

    let b = &files[Path::new("/build/rel/b.c")];
    assert_eq!(b.lines, vec![LineDecl::new(1, 1, Some(false))]);
}

#[rstest]
fn test_gcov_text_ignores_records_before_first_file(gcov_text: GcovText) {
    let files = gcov_text.parse_text("lcount:1,1,0\nfunction:1,2,3,f\n");

    assert!(files.is_empty());
}

#[rstest]
fn test_gcov_json_reads_gzipped_dump(gcov_json: GcovJson) {
    // Setup
    let temp_dir = tempdir().unwrap();
    let dump = temp_dir.path().join("a.gcda.gcov.json.gz");
    let json = r#"{
        "format_version": "1",
        "gcc_version": "13.2.0",
        "files": [
            {
                "file": "/src/a.c",
                "functions": [
                    {
                        "name": "_Z3foov",
                        "demangled_name": "foo()",
                        "start_line": 2,
                        "end_line": 4,
                        "start_column": 5,
                        "end_column": 1,
                        "blocks": 3,
                        "execution_count": 3
                    },
                    {"name": "no_count"}
                ],
                "lines": [
                    {"line_number": 2, "count": 3, "unexecuted_block": false, "function_name": "_Z3foov"},
                    {"line_number": "bad", "count": 1},
                    {"line_number": 0, "count": 1}
                ]
            },
            {"functions": [], "lines": []}
        ]
    }"#;
    let mut encoder = GzEncoder::new(fs::File::create(&dump).unwrap(), Compression::default());
    encoder.write_all(json.as_bytes()).unwrap();
    encoder.finish().unwrap();

    // Execute
    let files = gcov_json.read(&dump).unwrap();

    // Verify
    assert_eq!(files.len(), 1);
    let a = &files[Path::new("/src/a.c")];
    assert_eq!(a.functions.len(), 2);
    assert!(a.functions[0].is_complete());
    assert_eq!(a.functions[0].demangled_name.as_deref(), Some("foo()"));
    assert!(!a.functions[1].is_complete());
    assert_eq!(a.lines, vec![LineDecl::new(2, 3, Some(false))]);
}

#[rstest]
fn test_unreadable_file_parses_to_nothing(gcov_json: GcovJson) {
    let temp_dir = tempdir().unwrap();
    let dump = temp_dir.path().join("broken.gcov.json.gz");
    fs::write(&dump, b"not gzip at all").unwrap();

    assert!(gcov_json.read(&dump).is_err());
    assert!(gcov_json.parse(&dump).is_empty());
}

#[rstest]
fn test_llvm_export_version_two(llvm_export: LlvmExport) {
    // Setup
    let json = r#"{
        "type": "llvm.coverage.json.export",
        "version": "2.0.1",
        "data": [{
            "files": [{
                "filename": "/src/a.c",
                "segments": [
                    [1, 1, 5, true, true, false],
                    [2, 5, 3, true, false, false],
                    [3, 1, 0, false, false, false]
                ],
                "summary": {}
            }],
            "functions": [
                {
                    "name": "main",
                    "count": 4,
                    "filenames": ["/src/a.c"],
                    "regions": [[1, 1, 3, 2, 4, 0, 0, 0], [2, 1, 2, 9, 0, 0, 0, 2]]
                },
                {
                    "name": "macro_only",
                    "count": 1,
                    "filenames": ["/src/a.c"],
                    "regions": [[5, 1, 6, 1, 1, 0, 0, 1]]
                }
            ]
        }]
    }"#;

    // Execute
    let files = llvm_export.parse_export(json).unwrap();

    // Verify
    let a = &files[Path::new("/src/a.c")];
    assert_eq!(
        a.lines,
        vec![LineDecl::new(2, 5, None), LineDecl::new(3, 3, None)]
    );
    assert_eq!(
        a.functions,
        vec![FunctionDecl {
            start_line: Some(1),
            end_line: Some(3),
            start_column: Some(1),
            end_column: Some(2),
            execution_count: Some(4),
            name: Some("main".to_string()),
            demangled_name: None,
        }]
    );
}

#[rstest]
#[case::newer("3.0.0")]
#[case::older("1.0")]
fn test_llvm_export_other_versions_are_ignored(llvm_export: LlvmExport, #[case] version: &str) {
    let json = format!(
        r#"{{"version": "{version}", "data": [{{"files": [{{"filename": "/src/a.c", "segments": [[1, 1, 1, true, false, false]]}}]}}]}}"#
    );

    let files = llvm_export.parse_export(&json).unwrap();

    assert!(files.is_empty());
}

#[rstest]
fn test_llvm_target_pattern(llvm_export: LlvmExport) {
    let pattern = llvm_export.target_pattern().unwrap();
    let exe = std::env::consts::EXE_SUFFIX;

    assert!(pattern.is_match(&format!("app{exe}")));
    assert!(pattern.is_match(&format!("app-1.2.3{exe}")));
    assert!(!pattern.is_match(&format!("app-beta{exe}")));
    assert!(!pattern.is_match(&format!("myapp{exe}")));
}

const COBERTURA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
<coverage line-rate="0.5" version="1.9">
  <sources>SOURCES</sources>
  <packages>
    <package name="app">
      <classes>
        <class name="a.c" filename="src/a.c">
          <lines>
            <line number="4" hits="0"/>
            <line number="2" hits="3"/>
            <line number="x" hits="1"/>
          </lines>
        </class>
        <class name="empty" filename="src/empty.c">
          <lines>
            <line number="1" hits="none"/>
          </lines>
        </class>
      </classes>
    </package>
  </packages>
</coverage>
"#;

#[rstest]
#[case::single_source("<source>/proj</source>", "/proj/src/a.c")]
#[case::single_source_with_separator("<source>/proj/</source>", "/proj/src/a.c")]
#[case::several_sources("<source>/one</source><source>/two</source>", "/src/a.c")]
#[case::no_sources("", "/src/a.c")]
fn test_cobertura_disk_prefix(#[case] sources: &str, #[case] expected: &str) {
    // Setup
    let xml = COBERTURA.replace("SOURCES", sources);

    // Execute
    let files = CoberturaXml::new()
        .parse_xml(&xml, Path::new("/reports/coverage.xml"))
        .unwrap();

    // Verify
    assert_eq!(files.len(), 1);
    let (path, info) = files.iter().next().unwrap();
    assert_eq!(path, &PathBuf::from(expected));
    assert!(info.functions.is_empty());
    assert_eq!(
        info.lines,
        vec![LineDecl::new(2, 3, Some(false)), LineDecl::new(4, 0, Some(false))]
    );
}

#[test]
fn test_cobertura_without_packages() {
    let files = CoberturaXml::new()
        .parse_xml("<coverage/>", Path::new("/reports/coverage.xml"))
        .unwrap();

    assert!(files.is_empty());
}

#[rstest]
#[case::ubuntu_gcc("gcov (Ubuntu 11.4.0-1ubuntu1~22.04) 11.4.0\nCopyright (C) 2021", ToolFamily::Gcc, vec![11, 4, 0])]
#[case::old_gcc("gcov (GCC) 8.5.0 20210514 (Red Hat 8.5.0-4)", ToolFamily::Gcc, vec![8, 5, 0])]
#[case::llvm("LLVM (http://llvm.org/):\n  LLVM version 14.0.0\n  Optimized build.", ToolFamily::Llvm, vec![14, 0, 0])]
#[case::distro_llvm("Ubuntu LLVM version 18.1.3\n", ToolFamily::Llvm, vec![18, 1, 3])]
fn test_version_banner(
    #[case] banner: &str,
    #[case] family: ToolFamily,
    #[case] version: Vec<u32>,
) {
    let detected = parse_version_banner(banner).unwrap();

    assert_eq!(detected.family, family);
    assert_eq!(detected.version, version);
}

#[rstest]
#[case::empty("")]
#[case::other_tool("clang version 17.0.0")]
#[case::garbage_version("gcov (GCC) unknown")]
fn test_unrecognized_version_banner(#[case] banner: &str) {
    assert!(parse_version_banner(banner).is_none());
}

#[fixture]
fn config() -> RunConfig {
    RunConfig::new(
        Path::new("/src"),
        Path::new("/build"),
        Path::new("/int"),
        vec![PathBuf::from(".")],
    )
}

#[rstest]
fn test_guess_tool_cobertura(mut config: RunConfig) {
    config.cobertura = true;

    let tool = guess_tool(&config).unwrap();

    assert!(matches!(tool, Tool::Cobertura(_)));
    assert_eq!(tool.extension(), ".xml");
    assert!(tool.default_exclusion_tags().contains(&"msvc".to_string()));
}

#[rstest]
fn test_guess_tool_requires_some_input(config: RunConfig) {
    assert!(matches!(guess_tool(&config), Err(Error::Config(_))));
}

#[rstest]
fn test_guess_tool_rejects_unknown_binary(mut config: RunConfig) {
    config.gcov = Some(PathBuf::from("/definitely/not/a/coverage/tool"));

    assert!(matches!(
        guess_tool(&config),
        Err(Error::UnrecognizedTool(_))
    ));
}

#[test]
fn test_cobertura_filenames_are_normalized() {
    // Setup
    let xml = COBERTURA
        .replace("SOURCES", "<source>/proj/build</source>")
        .replace(r#"filename="src/a.c""#, r#"filename="../src/./a.c""#);

    // Execute
    let files = CoberturaXml::new()
        .parse_xml(&xml, Path::new("/reports/coverage.xml"))
        .unwrap();

    // Verify
    let paths: Vec<&PathBuf> = files.keys().collect();
    assert_eq!(paths, vec![&PathBuf::from("/proj/src/a.c")]);
}

/// Writes an executable shell script standing in for an external tool
#[cfg(unix)]
fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script lines appending the working directory and each argument to `log`
#[cfg(unix)]
fn recording_body(log: &Path) -> String {
    format!(
        "{{ pwd; for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done; echo ---; }} >> '{}'\n",
        log.display()
    )
}

/// One entry per invocation: the working directory followed by the arguments
#[cfg(unix)]
fn recorded_runs(log: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(log)
        .unwrap()
        .split("---\n")
        .filter(|run| !run.is_empty())
        .map(|run| run.lines().map(str::to_string).collect())
        .collect()
}

#[cfg(unix)]
fn touch(root: &Path, names: &[&str]) {
    for name in names {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }
}

#[cfg(unix)]
fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(unix)]
#[test]
fn test_gcov_runs_once_per_notes_directory() {
    // Setup
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let bin_dir = root.join("build");
    let int_dir = root.join("int");
    touch(
        &bin_dir,
        &["top.gcno", "lib/core/b.gcno", "lib/core/a.gcno", "lib/core/a.o"],
    );
    let log = root.join("gcov.log");
    let gcov = fake_tool(root, "gcov", &recording_body(&log));

    // Execute
    GcovText::new(&gcov, &bin_dir, &int_dir).preprocess().unwrap();

    // Verify
    let runs = recorded_runs(&log);
    assert_eq!(runs.len(), 2);

    let top = &runs[0];
    assert_eq!(top[0], display(&fs::canonicalize(&int_dir).unwrap()));
    assert_eq!(
        top[1..],
        [
            "-l".to_string(),
            "-b".to_string(),
            "-c".to_string(),
            "-i".to_string(),
            "-p".to_string(),
            "-o".to_string(),
            display(&bin_dir),
            display(&bin_dir.join("top.gcno")),
        ]
    );

    let core = &runs[1];
    let core_dir = int_dir.join("lib#core");
    assert!(core_dir.is_dir());
    assert_eq!(core[0], display(&fs::canonicalize(&core_dir).unwrap()));
    assert_eq!(
        core[6..],
        [
            "-o".to_string(),
            display(&bin_dir.join("lib/core")),
            display(&bin_dir.join("lib/core/a.gcno")),
            display(&bin_dir.join("lib/core/b.gcno")),
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_failing_gcov_surfaces_its_stderr() {
    // Setup
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    touch(&root.join("build"), &["a.gcno"]);
    let gcov = fake_tool(
        root,
        "gcov",
        "echo 'a.gcno:cannot open notes file' >&2\nexit 3\n",
    );
    let tool = GcovJson::new(&gcov, &root.join("build"), &root.join("int"));

    // Execute
    let result = tool.preprocess();

    // Verify
    match result {
        Err(Error::ToolFailed {
            tool,
            status,
            stderr,
        }) => {
            assert_eq!(tool, display(&gcov));
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr, "a.gcno:cannot open notes file\n");
        }
        other => panic!("expected a tool failure, got {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn test_llvm_preprocess_merges_then_exports_each_executable() {
    // Setup
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let bin_dir = root.join("build");
    let int_dir = root.join("int");
    touch(
        &bin_dir,
        &[
            "default.profraw",
            "tests/unit.profraw",
            "bin/app",
            "bin/app-1.2.3",
            "bin/app-test",
            "bin/app-beta",
            "bin/helper",
            "bin/sub/app",
        ],
    );
    let export = r#"{"type":"llvm.coverage.json.export","version":"2.0.1","data":[]}"#;
    let merge_log = root.join("merge.log");
    let cov_log = root.join("cov.log");
    let merge = fake_tool(root, "llvm-profdata", &recording_body(&merge_log));
    let cov = fake_tool(
        root,
        "llvm-cov",
        &format!("{}printf '%s' '{}'\n", recording_body(&cov_log), export),
    );
    let tool = LlvmExport::new(&cov, &merge, "app", &bin_dir, &int_dir);

    // Execute
    tool.preprocess().unwrap();

    // Verify
    let profile_data = display(&int_dir.join("coverage.profdata"));
    let merges = recorded_runs(&merge_log);
    assert_eq!(merges.len(), 1);
    assert_eq!(
        merges[0][1..],
        [
            "merge".to_string(),
            "-sparse".to_string(),
            display(&bin_dir.join("default.profraw")),
            display(&bin_dir.join("tests/unit.profraw")),
            "-o".to_string(),
            profile_data.clone(),
        ]
    );

    let exported: Vec<String> = recorded_runs(&cov_log)
        .into_iter()
        .map(|run| {
            assert_eq!(
                run[1..7],
                [
                    "export",
                    "-format",
                    "text",
                    "-skip-expansions",
                    "-instr-profile",
                    profile_data.as_str(),
                ]
            );
            run[7].clone()
        })
        .collect();
    assert_eq!(
        exported,
        vec![
            display(&bin_dir.join("bin/app")),
            display(&bin_dir.join("bin/app-1.2.3")),
            display(&bin_dir.join("bin/app-test")),
        ]
    );

    for name in ["app", "app-1.2.3", "app-test"] {
        let local = int_dir.join(format!("bin/{name}.profjson"));
        assert_eq!(fs::read_to_string(&local).unwrap(), export);
        assert!(tool.read(&local).unwrap().is_empty());
    }
    assert!(!int_dir.join("bin/app-beta.profjson").exists());
    assert!(!int_dir.join("bin/helper.profjson").exists());
}

#[cfg(unix)]
#[test]
fn test_llvm_preprocess_without_raw_profiles_runs_nothing() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    touch(&root.join("build"), &["bin/app"]);
    let merge = fake_tool(root, "llvm-profdata", "exit 1\n");
    let cov = fake_tool(root, "llvm-cov", "exit 1\n");
    let tool = LlvmExport::new(&cov, &merge, "app", &root.join("build"), &root.join("int"));

    tool.preprocess().unwrap();

    assert!(!root.join("int").exists());
}

#[cfg(unix)]
#[test]
fn test_failing_merge_stops_before_export() {
    // Setup
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    touch(&root.join("build"), &["default.profraw", "bin/app"]);
    let cov_log = root.join("cov.log");
    let merge = fake_tool(root, "llvm-profdata", "echo 'malformed profile' >&2\nexit 1\n");
    let cov = fake_tool(root, "llvm-cov", &recording_body(&cov_log));
    let tool = LlvmExport::new(&cov, &merge, "app", &root.join("build"), &root.join("int"));

    // Execute
    let result = tool.preprocess();

    // Verify
    assert!(matches!(
        result,
        Err(Error::ToolFailed { ref stderr, .. }) if stderr.contains("malformed profile")
    ));
    assert!(!cov_log.exists());
}
