//! CLI tests for the offline `aidi` commands.
//!
//! Spawns the binary inside a temporary workspace and checks output and exit
//! codes. No model service is contacted.

use std::fs;
use std::process::Command;

use aidi::exit_codes;
use aidi::test_support::TestWorkspace;

fn aidi(workspace: &TestWorkspace, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_aidi"))
        .current_dir(workspace.root())
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .args(args)
        .output()
        .expect("spawn aidi")
}

#[test]
fn prompt_renders_selected_components() {
    let workspace = TestWorkspace::new().expect("workspace");
    workspace
        .write_data("source_data.json", r#"{"name": "Michael Bird"}"#)
        .expect("write");
    workspace
        .write_data("target_data.json", r#"{"full_name": "Michael Bird"}"#)
        .expect("write");
    workspace
        .write_data("target_schema.json", r#"{"type": "object"}"#)
        .expect("write");

    let output = aidi(&workspace, &["prompt"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("{'name': 'Michael Bird'}"));
    assert!(stdout.contains("{'type': 'object'}"));
    assert!(!stdout.contains("full_name"), "target data is not selected by default");
}

#[test]
fn run_without_credentials_fails_at_startup() {
    let workspace = TestWorkspace::new().expect("workspace");
    fs::write(
        workspace.root().join("aidi.toml"),
        "active_service = \"OpenAI\"\n\n[services.OpenAI]\nselected_model = \"gpt-4o\"\n",
    )
    .expect("write config");

    let output = aidi(&workspace, &["run"]);

    assert_eq!(output.status.code(), Some(exit_codes::ERROR));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
}

#[test]
fn invalid_config_is_rejected() {
    let workspace = TestWorkspace::new().expect("workspace");
    fs::write(workspace.root().join("aidi.toml"), "[group_chat]\nmax_round = 0\n").expect("write config");

    let output = aidi(&workspace, &["prompt"]);

    assert_eq!(output.status.code(), Some(exit_codes::ERROR));
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_round"));
}

#[cfg(unix)]
mod with_shell_programs {
    use super::*;

    fn workspace_with_program(program: &str) -> TestWorkspace {
        let workspace = TestWorkspace::new().expect("workspace");
        fs::write(workspace.root().join("aidi.toml"), "[code]\npython = \"sh\"\n").expect("write config");
        workspace
            .write_data(
                "target_data.json",
                r#"{"Name_notes": "Abutment", "Asset_Code": "CV-CV-Abutment-G-P"}"#,
            )
            .expect("write");
        workspace.write_program("translate.sh", program).expect("write program");
        workspace
    }

    #[test]
    fn validate_reports_missing_key() {
        let workspace = workspace_with_program("echo \"{'Name_notes': 'Abutment'}\"");

        let output = aidi(&workspace, &["validate", "--method", "structural"]);

        assert_eq!(output.status.code(), Some(exit_codes::INVALID));
        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(
            lines,
            vec!["Key 'Asset_Code' is missing in target data.", "INVALID"]
        );
    }

    #[test]
    fn validate_accepts_identical_data() {
        let workspace = workspace_with_program(
            "echo \"{'Name_notes': 'Abutment', 'Asset_Code': 'CV-CV-Abutment-G-P'}\"",
        );

        let output = aidi(&workspace, &["validate", "--method", "deep"]);

        assert_eq!(output.status.code(), Some(exit_codes::OK));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "VALID");
    }

    #[test]
    fn generate_writes_generated_data() {
        let workspace = workspace_with_program("echo \"{'Asset_Code': 'X', 'ok': True}\"");

        let output = aidi(&workspace, &["generate"]);

        assert_eq!(output.status.code(), Some(exit_codes::OK));
        let written = fs::read_to_string(
            workspace
                .root()
                .join("translation_folder")
                .join("generated_target_data.json"),
        )
        .expect("generated data");
        let value: serde_json::Value = serde_json::from_str(&written).expect("json");
        assert_eq!(value, serde_json::json!({"Asset_Code": "X", "ok": true}));
    }

    #[test]
    fn failing_program_is_an_error_offline() {
        let workspace = workspace_with_program("echo boom >&2; exit 3");

        let output = aidi(&workspace, &["validate"]);

        assert_eq!(output.status.code(), Some(exit_codes::ERROR));
        assert!(String::from_utf8_lossy(&output.stderr).contains("boom"));
    }

    #[test]
    fn rename_moves_latest_program() {
        let workspace = workspace_with_program("echo \"{}\"");

        let output = aidi(&workspace, &["rename"]);

        assert_eq!(output.status.code(), Some(exit_codes::OK));
        let folder = workspace.root().join("translation_folder");
        assert!(folder.join("program_generated_by_AI.py").is_file());
        assert!(!folder.join("translate.sh").exists());
    }
}
