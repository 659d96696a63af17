//! In-memory collaborators for driving `ModelQuantizer` without processes or
//! network access.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use allquants_core::hub::HubUser;
use allquants_core::{
    AllQuantsError, CancellationToken, CommandOutput, CommandRunner, CommandSpec, Confirmer,
    ModelHub, ModelQuantizer, QuantizerConfig, Reporter, Result, Step, WorkflowEvent,
};
use async_trait::async_trait;
use tempfile::TempDir;

pub const CARD_TEMPLATE: &str =
    "# {{base_model}}-GGUF\n\nGGUF quantizations of [{{base_model_w_author}}](https://huggingface.co/{{base_model_w_author}}).\n";

/// Pretends to be `convert.py` and `llama-quantize` by writing their output files.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: Mutex<Vec<CommandSpec>>,
    /// Profiles whose quantizer run exits non-zero.
    pub failing_profiles: Vec<String>,
    /// Exit code for the converter.
    pub convert_exit: i32,
    /// Profile whose quantizer cannot be launched at all.
    pub unlaunchable_profile: Option<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(profiles: &[&str]) -> Self {
        Self {
            failing_profiles: profiles.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Profile argument of every quantizer invocation, in order.
    pub fn quantized_profiles(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|c| !is_convert(c))
            .map(|c| c.args[2].to_string_lossy().into_owned())
            .collect()
    }
}

fn is_convert(spec: &CommandSpec) -> bool {
    spec.args.iter().any(|a| a == "--outfile")
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        if is_convert(spec) {
            let outfile = spec
                .args
                .iter()
                .skip_while(|a| *a != "--outfile")
                .nth(1)
                .map(PathBuf::from)
                .expect("convert command has --outfile");
            if self.convert_exit != 0 {
                std::fs::write(&outfile, b"partial").unwrap();
                return Ok(CommandOutput {
                    exit_code: self.convert_exit,
                    stdout: "Loading model\nERROR: unsupported architecture\n".into(),
                    stderr: String::new(),
                });
            }
            std::fs::write(&outfile, b"GGUF f16").unwrap();
            return Ok(CommandOutput {
                exit_code: 0,
                stdout: "Model successfully exported".into(),
                stderr: String::new(),
            });
        }

        let output = PathBuf::from(&spec.args[1]);
        let profile = spec.args[2].to_string_lossy().into_owned();
        if self.unlaunchable_profile.as_deref() == Some(profile.as_str()) {
            return Err(AllQuantsError::Spawn {
                program: spec.program_name(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }
        if self.failing_profiles.contains(&profile) {
            return Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("invalid ftype {profile}"),
            });
        }
        std::fs::write(&output, format!("GGUF {profile}")).unwrap();
        Ok(CommandOutput {
            exit_code: 0,
            stdout: "llama_model_quantize_impl: model size = 1.00 MB".into(),
            stderr: String::new(),
        })
    }
}

/// Hub double that writes a tiny snapshot and records uploads.
#[derive(Default)]
pub struct FakeHub {
    pub downloads: Mutex<Vec<String>>,
    pub created_repos: Mutex<Vec<String>>,
    /// `(repo_id, path_in_repo)` in upload order.
    pub uploads: Mutex<Vec<(String, String)>>,
    pub card: Mutex<Option<String>>,
    /// Fail every snapshot download.
    pub fail_downloads: bool,
    /// Fail the upload after this many files were accepted.
    pub fail_upload_after: Option<usize>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_downloads() -> Self {
        Self {
            fail_downloads: true,
            ..Self::default()
        }
    }

    pub fn failing_upload_after(accepted: usize) -> Self {
        Self {
            fail_upload_after: Some(accepted),
            ..Self::default()
        }
    }

    fn accept_upload(&self, repo_id: &str, path_in_repo: &str) -> Result<()> {
        let mut uploads = self.uploads.lock().unwrap();
        if self.fail_upload_after == Some(uploads.len()) {
            return Err(AllQuantsError::HubApi {
                message: format!("upload of {path_in_repo} rejected"),
                status_code: Some(500),
            });
        }
        uploads.push((repo_id.to_string(), path_in_repo.to_string()));
        Ok(())
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelHub for FakeHub {
    async fn download_snapshot(&self, repo_id: &str, dest_dir: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(repo_id.to_string());
        if self.fail_downloads {
            std::fs::create_dir_all(dest_dir).unwrap();
            std::fs::write(dest_dir.join("config.json"), b"{}").unwrap();
            return Err(AllQuantsError::DownloadFailed {
                url: format!("https://huggingface.co/{repo_id}/resolve/main/model.safetensors"),
                message: "connection reset".into(),
            });
        }
        std::fs::create_dir_all(dest_dir).unwrap();
        std::fs::write(dest_dir.join("config.json"), b"{}").unwrap();
        std::fs::write(dest_dir.join("model.safetensors"), b"weights").unwrap();
        Ok(())
    }

    async fn create_repo(&self, repo_id: &str) -> Result<()> {
        self.created_repos.lock().unwrap().push(repo_id.to_string());
        Ok(())
    }

    async fn upload_file(&self, repo_id: &str, local_path: &Path, path_in_repo: &str) -> Result<()> {
        if !local_path.is_file() {
            return Err(AllQuantsError::FileNotFound(local_path.to_path_buf()));
        }
        self.accept_upload(repo_id, path_in_repo)
    }

    async fn upload_bytes(&self, repo_id: &str, content: Vec<u8>, path_in_repo: &str) -> Result<()> {
        *self.card.lock().unwrap() = Some(String::from_utf8(content).unwrap());
        self.accept_upload(repo_id, path_in_repo)
    }

    async fn whoami(&self) -> Result<HubUser> {
        Ok(HubUser {
            name: "tester".into(),
            orgs: Vec::new(),
        })
    }
}

/// Collects every event.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: WorkflowEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Answers gates from a table; unlisted steps are accepted.
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: HashMap<Step, Result<bool>>,
    pub asked: Mutex<Vec<Step>>,
}

impl ScriptedConfirmer {
    pub fn decline(step: Step) -> Self {
        let mut answers = HashMap::new();
        answers.insert(step, Ok(false));
        Self {
            answers,
            asked: Mutex::default(),
        }
    }

    pub fn interrupt(step: Step) -> Self {
        let mut answers = HashMap::new();
        answers.insert(step, Err(AllQuantsError::Cancelled));
        Self {
            answers,
            asked: Mutex::default(),
        }
    }

    pub fn asked(&self) -> Vec<Step> {
        self.asked.lock().unwrap().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, step: Step, _prompt: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(step);
        match self.answers.get(&step) {
            Some(Ok(answer)) => Ok(*answer),
            Some(Err(_)) => Err(AllQuantsError::Cancelled),
            None => Ok(true),
        }
    }
}

/// A base directory with the converter script, card template and quantizer.
pub struct TestEnv {
    pub temp: TempDir,
    pub runner: Arc<FakeRunner>,
    pub hub: Arc<FakeHub>,
    pub reporter: Arc<RecordingReporter>,
    pub cancel: CancellationToken,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_runner(FakeRunner::new())
    }

    pub fn with_runner(runner: FakeRunner) -> Self {
        Self::with_fakes(runner, FakeHub::new())
    }

    pub fn with_hub(hub: FakeHub) -> Self {
        Self::with_fakes(FakeRunner::new(), hub)
    }

    pub fn with_fakes(runner: FakeRunner, hub: FakeHub) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let base = temp.path();
        std::fs::write(base.join("convert.py"), b"# converter").unwrap();
        std::fs::write(base.join("TEMPLATE.md"), CARD_TEMPLATE).unwrap();
        std::fs::create_dir_all(base.join("llama.cpp.bin")).unwrap();
        std::fs::write(base.join("llama.cpp.bin").join(quantizer_name()), b"").unwrap();

        Self {
            temp,
            runner: Arc::new(runner),
            hub: Arc::new(hub),
            reporter: Arc::new(RecordingReporter::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn base(&self) -> &Path {
        self.temp.path()
    }

    pub fn quantizer(&self) -> ModelQuantizer {
        let config = QuantizerConfig::new(self.base()).with_namespace("tester");
        ModelQuantizer::new(
            config,
            self.runner.clone(),
            self.hub.clone(),
            self.reporter.clone(),
            self.cancel.clone(),
        )
        .expect("quantizer")
    }
}

fn quantizer_name() -> &'static str {
    if cfg!(windows) {
        "llama-quantize.exe"
    } else {
        "llama-quantize"
    }
}
