//! Row models mapped from the SQLite tables, and the query parameters used to list them.

mod history_record;
mod message_query;
mod message_record;
mod notification_record;
mod user_record;

pub use history_record::HistoryRecord;
pub use message_query::{MessageDirection, MessageQuery};
pub use message_record::{MessageRecord, NewMessage, ThreadRow};
pub use notification_record::NotificationRecord;
pub use user_record::UserRecord;
