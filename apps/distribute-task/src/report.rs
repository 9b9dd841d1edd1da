//! Pipeline logging commands (`##vso[...]`) written to stdout.

/// Final task result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Succeeded,
    Failed,
}

impl TaskResult {
    fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }

    pub fn exit_code(self) -> std::process::ExitCode {
        match self {
            Self::Succeeded => std::process::ExitCode::SUCCESS,
            Self::Failed => std::process::ExitCode::FAILURE,
        }
    }
}

/// Escapes a message so it stays on one logging-command line.
fn escape(message: &str) -> String {
    message
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

pub fn warning(message: &str) -> String {
    format!("##vso[task.logissue type=warning]{}", escape(message))
}

pub fn error(message: &str) -> String {
    format!("##vso[task.logissue type=error]{}", escape(message))
}

pub fn complete(result: TaskResult, message: &str) -> String {
    format!(
        "##vso[task.complete result={};]{}",
        result.as_str(),
        escape(message)
    )
}

/// Lines reporting a failed run: the error itself, then the task result.
pub fn failure(message: &str) -> [String; 2] {
    [
        error(message),
        complete(TaskResult::Failed, "distribution failed"),
    ]
}
