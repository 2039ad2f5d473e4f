//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Route serving the live reload WebSocket.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Route serving the live reload client script.
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected browsers.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new reload hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected browsers.
    ///
    /// Returns how many received it; zero when nobody is connected.
    pub fn send(&self, msg: ReloadMessage) -> usize {
        self.sender.send(msg).unwrap_or(0)
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the client-side live reload script.
///
/// The script connects back to whichever host served the page, so it works
/// regardless of the address the server is reached through.
pub fn livereload_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const protocol = location.protocol === 'https:' ? 'wss://' : 'ws://';
  const url = protocol + location.host + '{}';
  let attempts = 0;
  const maxAttempts = 10;

  function connect() {{
    const ws = new WebSocket(url);

    ws.onopen = function() {{
      if (attempts > 0) {{
        // Server came back, most likely with a fresh build.
        location.reload();
        return;
      }}
      console.log('[livereload] Connected');
    }};

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;

        case 'connected':
          console.log('[livereload] Server acknowledged connection');
          break;
      }}
    }};

    ws.onclose = function() {{
      if (attempts < maxAttempts) {{
        attempts++;
        console.log('[livereload] Disconnected, retrying...');
        setTimeout(connect, 1000 * attempts);
      }}
    }};

    ws.onerror = function(e) {{
      console.error('[livereload] WebSocket error:', e);
    }};
  }}

  connect();
}})();
"#,
        ws_path
    )
}
