//! Domain model of the job board: records, validation and access rules.
//!
//! Nothing in this crate performs I/O; storage and HTTP layers build on it.

pub mod credential;
pub mod error;
pub mod policy;
pub mod types;
pub mod validation;

pub use error::DomainError;
pub use policy::{Actor, Principal};
pub use types::{
    Application, ApplicationId, ApplicationScope, ApplicationStatus, Job, JobFilter, JobId,
    JobInput, JobUpdate, NewUser, Role, UploadKind, User, UserId, UserUpdate,
};
