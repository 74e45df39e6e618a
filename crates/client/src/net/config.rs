use orbit::DEFAULT_INTERP_BUFFER_MS;

/// Client-tunable knobs. Everything here has a documented default per
/// SPEC_FULL.md §6; command line flags in `main.rs` override them.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub command_rate_hz: u32,
    pub interpolation_buffer_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
            command_rate_hz: 30,
            interpolation_buffer_ms: DEFAULT_INTERP_BUFFER_MS,
        }
    }
}
