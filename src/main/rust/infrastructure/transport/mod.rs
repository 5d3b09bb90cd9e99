mod mjpeg_transport;

pub use mjpeg_transport::MjpegTransport;
