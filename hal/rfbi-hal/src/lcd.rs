//! Display controller LCD channel
//!
//! In RFBI mode the display controller streams the composed frame into the
//! interface. The driver only needs to size and start that stream.

/// LCD output channel of the display controller
pub trait LcdOutput {
    /// Set the size of the streamed area in pixels
    fn set_size(&mut self, width: u16, height: u16);

    /// Start or stop streaming
    fn enable_output(&mut self, enable: bool);
}
