pub mod activities;
pub mod bus;
pub mod catalogue;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod naming;
pub mod programme_id;
pub mod progress;
pub mod store;
pub mod testing;
pub mod workflow;

pub use activities::{
    Activities, DownloadRequest, FetchError, FetchResult, FileTask, MetadataError,
    ProgrammeName, PublishError, UploadResult,
};
pub use bus::{log_subject, BroadcastBus, BusError, BusMessage, MessageBus, Subscription};
pub use catalogue::{BbcCatalogue, CatalogueError, MediaType, ProgrammeCatalogue, ProgrammeMetadata};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
    SanitizedConfig,
};
pub use engine::{
    ActivityContext, ActivityFailure, ActivityOptions, LocalScheduler, RetryPolicy,
    TaskScheduler, WorkflowError, WorkflowHandle, WorkflowInfo,
};
pub use programme_id::{parse_programme_url, validate_pid, PidError};
pub use store::{FsObjectStore, ObjectLocator, ObjectStore, PutObjectRequest, StoreError};
pub use workflow::{AggregateResult, DownloadPhase, DownloadWorkflow, ParsePhase, ParseWorkflow};
