//! Backend streaming endpoint, topic layout and reconnect policy defaults.

pub struct EndpointConfig {
    /// Base URL of the analysis backend (http scheme is rewritten to ws)
    pub server_url: &'static str,
    /// STOMP-over-WebSocket endpoint path
    pub stomp_path: &'static str,
    /// Virtual host sent in the STOMP CONNECT frame
    pub virtual_host: &'static str,
}

/// Destinations the backend publishes to and listens on.
pub struct TopicConfig {
    /// Card updates. Card-specific topics are `{analysis}.{cardId}`.
    pub analysis: &'static str,
    pub stop: &'static str,
    pub error: &'static str,
    pub start_destination: &'static str,
    pub stop_destination: &'static str,
}

pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

pub struct HeartbeatConfig {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

pub struct StreamConfig {
    pub endpoint: EndpointConfig,
    pub topics: TopicConfig,
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
}

pub const STREAM: StreamConfig = StreamConfig {
    endpoint: EndpointConfig {
        server_url: "http://localhost:8080",
        stomp_path: "/ws/stomp/analysis",
        virtual_host: "localhost",
    },
    topics: TopicConfig {
        analysis: "/topic/analysis",
        stop: "/topic/analysis.stop",
        error: "/topic/analysis.error",
        start_destination: "/app/analysis.start",
        stop_destination: "/app/analysis.stop",
    },
    reconnect: ReconnectConfig {
        max_attempts: 3,
        backoff_ms: 1000,
    },
    heartbeat: HeartbeatConfig {
        outgoing_ms: 4000,
        incoming_ms: 4000,
    },
};
