pub mod booking;
pub mod comment;
pub mod event;
pub mod session;
pub mod ticket;
pub mod user;

pub use booking::{Booking, BookingConfirmation, BookingHistoryRow, NewBooking};
pub use comment::{Comment, CommentView, NewComment};
pub use event::{Event, EventDraft, EventStatus, GENRES};
pub use session::Session;
pub use ticket::{TicketDraft, TicketType};
pub use user::{NewUser, User};
