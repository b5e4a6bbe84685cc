pub mod clock;
pub mod dispatch;
pub mod dns;
pub mod error;
pub mod render;
pub mod resolve;
pub mod send_loop;

pub use clock::{Clock, SystemClock};
pub use dispatch::{Dispatcher, OutgoingEmail, SmtpDispatcher};
pub use dns::{DnsConfig, DnsError, DnsMxChecker, MxChecker};
pub use error::{ContactError, DeliverabilityError, DispatchError, RenderError};
pub use render::{MustacheRenderer, RenderedEmail, Renderer};
pub use resolve::{AssetSelector, Assets};
pub use send_loop::{RunSummary, SendLoop, SentInfo};
