// Adapter tests against real sockets and processes

mod http;
#[cfg(unix)]
mod process;
mod ws;
