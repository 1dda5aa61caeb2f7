pub mod record_writer;
pub mod report_writer;
pub mod retrying_invoker;
pub mod topic_classifier;

pub use record_writer::{OutcomeStore, RecordWriter};
pub use report_writer::{BatchReporter, ReportWriter};
pub use retrying_invoker::{RetryPolicy, RetryingInvoker};
pub use topic_classifier::{classify, KeywordClassifier, TopicClassifier};
