use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn make_unique_temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "tinysh_e2e_{}_{}_{}",
        tag,
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    fs::canonicalize(dir).expect("canonical temp dir")
}

struct Shell {
    dir: PathBuf,
    envs: Vec<(String, String)>,
    args: Vec<String>,
}

impl Shell {
    fn new(tag: &str) -> Self {
        Self {
            dir: make_unique_temp_dir(tag),
            envs: Vec::new(),
            args: Vec::new(),
        }
    }

    fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Run the shell in `dir` with `input` on stdin; `HOME` points at `dir`.
    fn run(&self, input: &str) -> Output {
        self.run_bytes(input.as_bytes())
    }

    fn run_bytes(&self, input: &[u8]) -> Output {
        let mut child = Command::new(env!("CARGO_BIN_EXE_tinysh"))
            .args(&self.args)
            .current_dir(&self.dir)
            .env("HOME", &self.dir)
            .env_remove("HISTFILE")
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn tinysh");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input)
            .unwrap();
        child.wait_with_output().expect("wait for tinysh")
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn builtin_piped_into_external() {
    let sh = Shell::new("pipe");
    let out = sh.run("echo hello | cat\n");
    assert!(out.status.success());
    assert!(stdout(&out).contains("hello\n"), "stdout: {:?}", stdout(&out));
    assert_eq!(stderr(&out), "");
}

#[test]
fn prompt_is_printed_before_each_line() {
    let sh = Shell::new("prompt");
    let out = sh.run("echo a\necho b\n");
    assert_eq!(stdout(&out), "$ a\n$ b\n$ ");
}

#[test]
fn quoted_arguments_keep_whitespace() {
    let sh = Shell::new("quotes");
    let out = sh.run("echo 'hello   world' \"a  b\" c\\ d\n");
    assert!(stdout(&out).contains("hello   world a  b c d\n"));
}

#[test]
fn invalid_utf8_line_does_not_end_the_loop() {
    let sh = Shell::new("utf8");
    let out = sh.run_bytes(b"echo \xff\necho after\n");
    assert!(out.status.success());
    assert!(stdout(&out).contains("\u{fffd}\n"), "stdout: {:?}", stdout(&out));
    assert!(stdout(&out).contains("after\n"));
    assert_eq!(stderr(&out), "");
}

#[test]
fn unknown_command_reports_and_continues() {
    let sh = Shell::new("notfound");
    let out = sh.run("nonexistent_cmd_xyz\necho after\n");
    assert!(stderr(&out).contains("nonexistent_cmd_xyz: command not found"));
    assert!(stdout(&out).contains("after\n"));
}

#[test]
fn failed_cd_keeps_directory() {
    let sh = Shell::new("cd");
    let out = sh.run("cd /nonexistent/path\npwd\n");
    assert!(
        stderr(&out).contains("cd: /nonexistent/path: No such file or directory"),
        "stderr: {:?}",
        stderr(&out)
    );
    assert!(stdout(&out).contains(&format!("{}\n", sh.dir.display())));
}

#[test]
fn cd_changes_directory_for_later_commands() {
    let sh = Shell::new("cd_ok");
    fs::create_dir(sh.path("sub")).unwrap();
    let out = sh.run("cd sub\npwd\ncd ~\npwd\n");
    let text = stdout(&out);
    assert!(text.contains(&format!("{}\n", sh.path("sub").display())));
    assert!(text.contains(&format!("$ {}\n", sh.dir.display())));
}

#[test]
fn stdout_redirection_truncates_and_appends() {
    let sh = Shell::new("redirect");
    let out = sh.run("echo first > out.txt\necho second >> out.txt\necho third 1>> out.txt\n");
    assert_eq!(stdout(&out), "$ $ $ $ ");
    assert_eq!(
        fs::read_to_string(sh.path("out.txt")).unwrap(),
        "first\nsecond\nthird\n"
    );

    sh.run("echo again > out.txt\n");
    assert_eq!(fs::read_to_string(sh.path("out.txt")).unwrap(), "again\n");
}

#[test]
fn stderr_redirection_of_external_command() {
    let sh = Shell::new("stderr");
    let out = sh.run("ls /nonexistent_dir_xyz 2> err.txt\n");
    assert_eq!(stderr(&out), "");
    let captured = fs::read_to_string(sh.path("err.txt")).unwrap();
    assert!(captured.contains("nonexistent_dir_xyz"), "captured: {:?}", captured);
}

#[test]
fn external_output_redirected_to_file() {
    let sh = Shell::new("ext_redirect");
    sh.run("printf 'x\\ny\\n' > out.txt\n");
    assert_eq!(fs::read_to_string(sh.path("out.txt")).unwrap(), "x\ny\n");
}

#[test]
fn unopenable_redirection_skips_the_command() {
    let sh = Shell::new("badredirect");
    let out = sh.run("echo hidden > missing_dir/out.txt\necho shown\n");
    assert!(stderr(&out).contains("missing_dir/out.txt"));
    assert!(!stdout(&out).contains("hidden"));
    assert!(stdout(&out).contains("shown\n"));
}

#[test]
fn middle_stage_exiting_early_does_not_hang() {
    let sh = Shell::new("three");
    let out = sh.run("echo hi | true | cat\necho done\n");
    assert!(stdout(&out).contains("done\n"));
    assert!(!stdout(&out).contains("hi\n"));
}

#[test]
fn writer_is_stopped_when_reader_exits() {
    let sh = Shell::new("sigpipe");
    let out = sh.run("yes | head -n 3\n");
    assert!(stdout(&out).contains("y\ny\ny\n"));
}

#[test]
fn builtins_run_inside_pipelines() {
    let sh = Shell::new("type");
    let out = sh.run("type echo | cat\ntype nonexistent_cmd_xyz\n");
    let text = stdout(&out);
    assert!(text.contains("echo is a shell builtin\n"));
    assert!(text.contains("nonexistent_cmd_xyz: not found\n"));
}

#[test]
fn lenient_builtin_arguments() {
    let sh = Shell::new("lenient");
    let out = sh.run("history -5\npwd extra\ncd -\n");
    assert_eq!(stderr(&out), "cd: -: No such file or directory\n");
    assert_eq!(stdout(&out), format!("$ $ {}\n$ $ ", sh.dir.display()));
}

#[test]
fn unterminated_quote_discards_line() {
    let sh = Shell::new("quote");
    let out = sh.run("echo 'abc\necho ok\n");
    assert!(stderr(&out).contains("unterminated quote"));
    assert!(!stdout(&out).contains("abc"));
    assert!(stdout(&out).contains("ok\n"));
}

#[test]
fn exit_stops_reading() {
    let sh = Shell::new("exit");
    let out = sh.run("exit\necho unreachable\n");
    assert!(out.status.success());
    assert!(!stdout(&out).contains("unreachable"));
}

#[test]
fn end_of_input_exits_cleanly() {
    let sh = Shell::new("eof");
    let out = sh.run("");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "$ ");
}

#[test]
fn history_written_and_read_back() {
    let sh = Shell::new("history");
    sh.run("echo one\nhistory -w hist.txt\n");
    assert_eq!(
        fs::read_to_string(sh.path("hist.txt")).unwrap(),
        "echo one\nhistory -w hist.txt\n"
    );

    let out = sh.run("history -r hist.txt\nhistory\n");
    let text = stdout(&out);
    assert!(text.contains("    1  history -r hist.txt\n"), "stdout: {:?}", text);
    assert!(text.contains("    2  echo one\n"));
    assert!(text.contains("    3  history -w hist.txt\n"));
    assert!(text.contains("    4  history\n"));
}

#[test]
fn history_append_writes_only_new_lines() {
    let sh = Shell::new("history_append");
    let out = sh.run("echo a\nhistory -a hist.txt\necho b\nhistory -a hist.txt\n");
    assert_eq!(stderr(&out), "");
    assert_eq!(
        fs::read_to_string(sh.path("hist.txt")).unwrap(),
        "echo a\nhistory -a hist.txt\necho b\nhistory -a hist.txt\n"
    );
}

#[test]
fn histfile_is_loaded_and_saved() {
    let sh = Shell::new("histfile");
    let histfile = sh.path("saved_history");
    fs::write(&histfile, "echo earlier\n").unwrap();
    let sh = sh.env("HISTFILE", &histfile.to_string_lossy());

    let out = sh.run("history 2\n");
    assert!(stdout(&out).contains("    1  echo earlier\n"));
    assert!(stdout(&out).contains("    2  history 2\n"));
    assert_eq!(
        fs::read_to_string(&histfile).unwrap(),
        "echo earlier\nhistory 2\n"
    );
}

#[test]
fn single_command_flag() {
    let sh = Shell::new("flag").arg("-c").arg("echo from flag | cat");
    let out = sh.run("");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "from flag\n");
}

#[test]
fn config_file_sets_prompt() {
    let sh = Shell::new("config");
    let config = sh.path("custom.toml");
    fs::write(&config, "[shell]\nprompt = \"% \"\n").unwrap();
    let sh = sh.arg("--config").arg(&config.to_string_lossy());

    let out = sh.run("echo hi\n");
    assert_eq!(stdout(&out), "% hi\n% ");
}

#[test]
fn missing_config_file_is_fatal() {
    let sh = Shell::new("noconfig").arg("--config").arg("/nonexistent/tinysh.toml");
    let out = sh.run("");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("/nonexistent/tinysh.toml"));
}

#[test]
fn debug_log_goes_to_file() {
    let sh = Shell::new("log");
    let log = sh.path("logs/tinysh.log");
    let config = sh.path("log.toml");
    fs::write(
        &config,
        format!("[log]\nlevel = \"debug\"\nfile = \"{}\"\n", log.display()),
    )
    .unwrap();
    let sh = sh.arg("--config").arg(&config.to_string_lossy());

    let out = sh.run("echo logged\n");
    assert_eq!(stdout(&out), "$ logged\n$ ");
    assert_eq!(stderr(&out), "");
    assert!(fs::metadata(Path::new(&log)).unwrap().len() > 0);
}
