pub mod domain;
pub mod memory;
pub mod ops;
pub mod ports;

pub use domain::{
    AssignmentStatus, AuthSession, Company, Course, CourseAssignment, CourseSummary, FileRef,
    InviteToken, Notification, NotificationKind, Principal, Role, Task, User,
};
pub use memory::MemoryStore;
pub use ports::{BlobStoreService, PasswordHashService, PortError, PortResult, Store};
