use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::ops::Range;

use pnet::util::MacAddr;

use crate::RxError;

/// Attributes a protocol extracted from its own header while parsing, kept
/// on the layer so protocols further up the stack can read them without
/// re-parsing earlier headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerAttributes {
    None,
    Ethernet { src: MacAddr, dst: MacAddr },
    Ipv4 { src: Ipv4Addr, dst: Ipv4Addr },
}

/// One named annotation over a byte range of a received frame.
#[derive(Debug, Clone)]
pub struct Layer {
    pub attributes: LayerAttributes,
    data: Range<usize>,
    tail: Option<Range<usize>>,
}

/// Layered view over one raw frame.
///
/// Each protocol handler claims the bytes of its own header from the front
/// of the remaining window, and optionally a trailer from the back, and
/// leaves the rest for the next layer. Claimed ranges never overlap and
/// the frame buffer is never copied.
pub struct PacketView {
    data: Vec<u8>,
    window: Range<usize>,
    layers: HashMap<&'static str, Layer>,
}

impl PacketView {
    pub fn new(data: Vec<u8>) -> PacketView {
        let window = 0..data.len();
        PacketView {
            data,
            window,
            layers: HashMap::new(),
        }
    }

    /// Claims `size` bytes from the front of the current window, and
    /// `tail_size` bytes from its back, as the layer `name`.
    pub fn add_layer(
        &mut self,
        name: &'static str,
        attributes: LayerAttributes,
        size: usize,
        tail_size: usize,
    ) -> Result<(), RxError> {
        if size + tail_size > self.window.len() {
            return Err(RxError::InvalidLength);
        }
        let data = self.window.start..self.window.start + size;
        let tail = if tail_size > 0 {
            Some(self.window.end - tail_size..self.window.end)
        } else {
            None
        };
        self.window = data.end..self.window.end - tail_size;
        self.layers.insert(name, Layer { attributes, data, tail });
        Ok(())
    }

    /// Returns the layer previously added under `name`.
    ///
    /// # Panics
    ///
    /// Panics if no such layer was added. Layers are only read by
    /// protocols above the one that produced them, so a miss is a bug in
    /// the protocol graph.
    pub fn layer(&self, name: &str) -> &Layer {
        match self.layers.get(name) {
            Some(layer) => layer,
            None => panic!("no layer named {:?} in packet", name),
        }
    }

    /// The bytes claimed by the layer `name`.
    pub fn layer_data(&self, name: &str) -> &[u8] {
        &self.data[self.layer(name).data.clone()]
    }

    /// The trailer bytes claimed by the layer `name`, if any.
    pub fn layer_tail(&self, name: &str) -> Option<&[u8]> {
        self.layer(name).tail.clone().map(move |range| &self.data[range])
    }

    /// The bytes not yet claimed by any layer.
    pub fn current(&self) -> &[u8] {
        &self.data[self.window.clone()]
    }

    /// The entire raw frame.
    pub fn all(&self) -> &[u8] {
        &self.data
    }
}
