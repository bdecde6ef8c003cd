//! Inference engine backed by an external generator program.
//!
//! The program is started once per generate request:
//!
//! ```text
//! <program> --model <path> --max-tokens <n> [--n-ctx n] [--n-gpu-layers n]
//!           [--n-threads n] [--temperature x] [--top-p x] [--top-k n]
//!           [--min-p x] [--repeat-penalty x] [--seed n]
//! ```
//!
//! The prompt is written to its stdin, and whatever it writes to stdout is
//! streamed back as fragments. Fragments never split a UTF-8 sequence.
//! Dropping the stream kills the program, which is how an abort stops it.

use std::{
    io::{Read, Write},
    path::PathBuf,
    process::{Child, ChildStdout, Command, Stdio},
};

use lineworks_core::{EngineError, InferenceEngine, ModelDirectory, TokenStream};
use lineworks_proto::{GenerateParams, LoadParams};

const READ_CHUNK: usize = 4096;

/// Engine that shells out to a generator program.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: Option<PathBuf>,
    models: ModelDirectory,
    loaded: Option<(LoadParams, PathBuf)>,
}

impl ProcessEngine {
    /// Engine listing models from `models` and generating with `program`.
    ///
    /// Without a program the engine still lists models but cannot load them.
    pub fn new(program: Option<PathBuf>, models: ModelDirectory) -> Self {
        Self { program, models, loaded: None }
    }

    fn command(&self, params: &GenerateParams) -> Result<Command, EngineError> {
        let program = self.program.as_ref().ok_or(EngineError::NotConfigured)?;
        let (load, path) = self.loaded.as_ref().ok_or(EngineError::NotLoaded)?;

        let mut command = Command::new(program);
        command.arg("--model").arg(path);
        command.arg("--max-tokens").arg(params.max_tokens.to_string());

        let mut flag = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                command.arg(name).arg(value);
            }
        };
        flag("--n-ctx", load.n_ctx.map(|v| v.to_string()));
        flag("--n-gpu-layers", load.n_gpu_layers.map(|v| v.to_string()));
        flag("--n-threads", load.n_threads.map(|v| v.to_string()));
        flag("--temperature", params.temperature.map(|v| v.to_string()));
        flag("--top-p", params.top_p.map(|v| v.to_string()));
        flag("--top-k", params.top_k.map(|v| v.to_string()));
        flag("--min-p", params.min_p.map(|v| v.to_string()));
        flag("--repeat-penalty", params.repeat_penalty.map(|v| v.to_string()));
        flag("--seed", params.seed.or(load.seed).map(|v| v.to_string()));

        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());
        Ok(command)
    }
}

impl InferenceEngine for ProcessEngine {
    fn models(&self) -> Result<Vec<String>, EngineError> {
        self.models.list()
    }

    fn device(&self) -> Option<String> {
        None
    }

    fn load(&mut self, params: &LoadParams) -> Result<(), EngineError> {
        if self.program.is_none() {
            return Err(EngineError::NotConfigured);
        }

        let path = self.models.resolve(&params.model_path)?;
        self.loaded = Some((params.clone(), path));
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = None;
    }

    fn generate(&mut self, params: &GenerateParams) -> Result<TokenStream<'_>, EngineError> {
        let mut child = self.command(params)?.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // Closing stdin marks the end of the prompt.
            if let Err(e) = stdin.write_all(params.prompt.as_bytes()) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Io("generator stdout unavailable".into()));
        };

        tracing::debug!(pid = child.id(), "generator started");
        Ok(Box::new(ProcessTokens { child, stdout, pending: Vec::new(), state: ReadState::Reading }))
    }
}

/// Where a [`ProcessTokens`] stream is in the generator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Reading,
    /// Output is exhausted and its tail emitted; the exit status is unchecked.
    Exiting,
    Finished,
}

/// Fragment stream read from a running generator.
struct ProcessTokens {
    child: Child,
    stdout: ChildStdout,
    pending: Vec<u8>,
    state: ReadState,
}

impl ProcessTokens {
    /// Take the longest decodable prefix of `pending`.
    fn take_text(&mut self) -> String {
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // An invalid sequence (not merely a truncated one) is replaced.
            Err(e) => match e.error_len() {
                Some(invalid) => e.valid_up_to() + invalid,
                None => e.valid_up_to(),
            },
        };

        let bytes: Vec<u8> = self.pending.drain(..valid).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Emit whatever is left of the output, then the exit status on the
    /// following call.
    fn finish(&mut self) -> Option<Result<String, EngineError>> {
        let tail = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
        if !tail.is_empty() {
            self.state = ReadState::Exiting;
            return Some(Ok(tail));
        }

        self.exit_status()
    }

    fn exit_status(&mut self) -> Option<Result<String, EngineError>> {
        self.state = ReadState::Finished;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(EngineError::Generation(format!("generator exited with {status}")))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

impl Iterator for ProcessTokens {
    type Item = Result<String, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            ReadState::Reading => {},
            ReadState::Exiting => return self.exit_status(),
            ReadState::Finished => return None,
        }

        let mut buf = [0u8; READ_CHUNK];
        loop {
            let read = match self.stdout.read(&mut buf) {
                Ok(0) => return self.finish(),
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ReadState::Finished;
                    return Some(Err(e.into()));
                },
            };

            self.pending.extend_from_slice(&buf[..read]);
            let text = self.take_text();
            if !text.is_empty() {
                return Some(Ok(text));
            }
        }
    }
}

impl Drop for ProcessTokens {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            tracing::debug!(pid = self.child.id(), "stopping generator");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
