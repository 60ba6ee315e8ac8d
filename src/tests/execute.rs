use std::env;

use crate::executor::execute_with;
use crate::provider::IoProvider;

// Run a script against a captured provider and return (stdout, stderr).
fn run(script: &str, stdin: &str) -> (String, String) {
    let (iop, out, err) = IoProvider::captured(stdin);
    execute_with(script, &iop).expect("execution failed").wait();
    iop.close();
    (out.string(), err.string())
}

fn run_err(script: &str) -> (String, String, String) {
    let (iop, out, err) = IoProvider::captured("");
    let failure = execute_with(script, &iop).expect_err("execution should fail");
    iop.close();
    (out.string(), err.string(), failure.to_string())
}

#[test]
fn echo_quoted() {
    let (stdout, stderr) = run("echo \"hello world\"", "");
    assert_eq!(stdout, "hello world\n");
    assert_eq!(stderr, "");
}

#[test]
fn echo_words() {
    let (stdout, _) = run("echo hello world", "");
    assert_eq!(stdout, "hello world\n");
}

#[test]
fn pipeline_into_cat() {
    let (stdout, stderr) = run("echo \"hello world\"|cat", "");
    assert_eq!(stdout, "hello world\n");
    assert_eq!(stderr, "");
}

#[test]
fn cat_copies_stdin() {
    let (stdout, _) = run("cat", "hello world\n");
    assert_eq!(stdout, "hello world\n");
}

#[test]
fn cat_reads_here_document() {
    let (stdout, _) = run("cat <<xyz\nhello\nworld\nxyz", "");
    assert_eq!(stdout, "hello\nworld\n");
}

#[test]
fn longer_pipeline() {
    let (stdout, _) = run("echo piped|cat|cat|cat", "");
    assert_eq!(stdout, "piped\n");
}

#[test]
fn sequencing_runs_left_to_right() {
    let (stdout, _) = run("echo one; echo two\necho three", "");
    assert_eq!(stdout, "one\ntwo\nthree\n");
}

#[test]
fn variable_expansion_reaches_execution() {
    unsafe { env::set_var("SEASHELL_E2E_GREETING", "hi there") };
    let (stdout, _) = run("echo $SEASHELL_E2E_GREETING", "");
    assert_eq!(stdout, "hi there\n");
}

#[test]
fn command_substitution_feeds_arguments() {
    let (stdout, _) = run("echo $(echo nested)", "");
    assert_eq!(stdout, "nested\n");
}

#[test]
fn or_runs_only_on_failure() {
    let (stdout, _) = run("false || echo rescued", "");
    assert_eq!(stdout, "rescued\n");
    let (stdout, _) = run("true || echo rescued", "");
    assert_eq!(stdout, "");
}

#[test]
fn and_runs_only_on_success() {
    let (stdout, _) = run("true && echo onward", "");
    assert_eq!(stdout, "onward\n");
    let (stdout, _) = run("false && echo onward", "");
    assert_eq!(stdout, "");
}

#[test]
fn chain_of_both_kinds() {
    let (stdout, _) = run("false || echo ok && echo meep", "");
    assert_eq!(stdout, "ok\nmeep\n");
}

#[test]
fn failure_aborts_remaining_commands() {
    let (stdout, _stderr, failure) = run_err("false; echo after");
    assert_eq!(stdout, "");
    assert!(failure.contains("failed to execute command 0"), "got: {failure}");
}

#[test]
fn background_commands_are_tracked_by_the_wait_handle() {
    let (iop, out, _err) = IoProvider::captured("");
    let handle = execute_with("echo from the background &", &iop).unwrap();
    assert!(!handle.is_empty());
    handle.wait();
    iop.close();
    assert_eq!(out.string(), "from the background\n");
}

#[test]
fn background_failure_goes_to_stderr_only() {
    let (iop, _out, err) = IoProvider::captured("");
    let handle = execute_with("false &", &iop).expect("background failure is not fatal");
    handle.wait();
    iop.close();
    assert!(err.string().contains("failed to execute command 0"));
}

#[test]
fn redirection_writes_to_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path = path.to_str().unwrap();

    let (_, _) = run(&format!("echo written > {path}"), "");
    let (stdout, _) = run(&format!("cat {path}"), "");
    assert_eq!(stdout, "written\n");
}

#[test]
fn append_redirection_accumulates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let path = path.to_str().unwrap();

    run(&format!("echo one >> {path}"), "");
    run(&format!("echo two >> {path}"), "");
    let (stdout, _) = run(&format!("cat < {path}"), "");
    assert_eq!(stdout, "one\ntwo\n");
}

#[test]
fn redirection_to_dev_null_discards() {
    let (stdout, _) = run("echo vanished > /dev/null", "");
    assert_eq!(stdout, "");
}

#[test]
fn stderr_merge_carries_diagnostics_through_a_pipeline() {
    // `type` reports unknown names on stderr without failing
    let (stdout, stderr) = run("type seashell_no_such_name_e2e 2>&1 | cat", "");
    assert_eq!(stdout, "type: seashell_no_such_name_e2e: not found\n");
    assert_eq!(stderr, "");
}

#[test]
fn type_reports_builtins() {
    let (stdout, _) = run("type echo", "");
    assert_eq!(stdout, "echo is a shell builtin\n");
}

#[test]
fn export_sets_process_environment() {
    let (_, _) = run("export SEASHELL_E2E_EXPORTED=from_script", "");
    assert_eq!(
        env::var("SEASHELL_E2E_EXPORTED").as_deref(),
        Ok("from_script")
    );
    run("unset SEASHELL_E2E_EXPORTED", "");
    assert!(env::var("SEASHELL_E2E_EXPORTED").is_err());
}

#[test]
fn export_bare_name_defaults_to_empty_only_if_unset() {
    unsafe { env::set_var("SEASHELL_E2E_KEPT", "kept") };
    run("export SEASHELL_E2E_KEPT SEASHELL_E2E_FRESH", "");
    assert_eq!(env::var("SEASHELL_E2E_KEPT").as_deref(), Ok("kept"));
    assert_eq!(env::var("SEASHELL_E2E_FRESH").as_deref(), Ok(""));
    unsafe { env::remove_var("SEASHELL_E2E_KEPT") };
    unsafe { env::remove_var("SEASHELL_E2E_FRESH") };
}

#[test]
fn pwd_prints_the_working_directory() {
    let (stdout, _) = run("pwd", "");
    let cwd = env::current_dir().unwrap();
    assert_eq!(stdout, format!("{}\n", cwd.display()));
}

#[test]
fn sleep_accepts_duration_strings() {
    let (_, stderr) = run("sleep 10ms", "");
    assert_eq!(stderr, "");
    let (_, _, failure) = run_err("sleep forever");
    assert!(failure.contains("invalid duration"), "got: {failure}");
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[test]
    fn external_command_output_is_captured() {
        let (stdout, stderr) = run("/bin/echo external", "");
        assert_eq!(stdout, "external\n");
        assert_eq!(stderr, "");
    }

    #[test]
    fn external_command_resolves_via_path() {
        let (stdout, _) = run("uname", "");
        assert!(!stdout.is_empty());
    }

    #[test]
    fn external_nonzero_exit_is_an_error() {
        let (_, stderr, failure) = run_err("sh -c \"exit 3\"");
        assert!(failure.contains("exited with status 3"), "got: {failure}");
        assert!(stderr.contains("failed to execute command"), "got: {stderr}");
    }

    #[test]
    fn missing_external_command_is_an_error() {
        let (_, _, failure) = run_err("seashell-no-such-binary-anywhere");
        assert!(
            failure.contains("failed to execute command 0"),
            "got: {failure}"
        );
    }

    #[test]
    fn external_commands_participate_in_pipelines() {
        let (stdout, _) = run("/bin/echo over the wire | cat", "");
        assert_eq!(stdout, "over the wire\n");
    }

    #[test]
    fn which_finds_binaries_on_path() {
        let (stdout, _) = run("which sh", "");
        assert!(stdout.trim_end().ends_with("sh"), "got: {stdout}");
        let (_, _, failure) = run_err("which seashell-no-such-binary");
        assert!(failure.contains("which"), "got: {failure}");
    }

    #[test]
    fn whoami_prints_a_user_name() {
        let (stdout, _) = run("whoami", "");
        assert!(!stdout.trim().is_empty());
    }
}
