mod buffer;
mod channel;
mod status;
