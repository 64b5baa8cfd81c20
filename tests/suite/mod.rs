mod netcat;
mod race_server;
mod scenario;
