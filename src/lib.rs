//! # itg-remote
//!
//! Remote control of a running ITGmania client over a single WebSocket:
//! - A compact binary command protocol with JSON response envelopes
//! - An agent that lives inside the game and answers commands
//! - A controller that correlates responses and drives test cycles
//!
//! ## Components
//!
//! - `itg-remote-protocol`: framing, payload primitives, value encoding, command table
//! - `itg-remote-agent`: session, dispatcher, host boundary and reconnecting client
//! - `itg-remote-controller`: correlator, response router, WebSocket server and harness
//!
//! ## Example
//!
//! See the `demos/` directory for a simulated agent and a probing controller.

pub use itg_remote_agent as agent;
pub use itg_remote_controller as controller;
pub use itg_remote_protocol as protocol;
