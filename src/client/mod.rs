//! Consumer side of the live update channel.

pub mod connector;
pub mod error;
pub mod live_channel;
pub mod local_view;
pub mod target;

pub use connector::{Connector, FrameSink, FrameStream, LiveTransport, WsConnector};
pub use error::ClientError;
pub use live_channel::{ChannelEvent, LiveChannelClient, ReadyState, ReconnectOptions};
pub use local_view::LocalView;
pub use target::resolve_channel_url;
