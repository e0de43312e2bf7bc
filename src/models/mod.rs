pub mod request;
pub mod run;
pub mod task;
pub mod verdict;

pub use request::{Identity, QuizRequest, QuizResponse, SubmitPayload};
pub use run::{CompletionReason, FailureCategory, RunPhase, RunReport, RunStatus, SubmissionRecord};
pub use task::{Answer, AnswerFormat, QuizTask};
pub use verdict::SubmissionVerdict;
