//! IPv4 with a fixed 20 byte header. No options, no fragmentation; the DF
//! bit is tolerated on incoming packets, everything else in the
//! flags/fragment-offset field is rejected.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use pnet::packet::ethernet::EtherTypes;
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{checksum, Ipv4Packet, MutableIpv4Packet};

use crate::adapter::NetworkAdapter;
use crate::graph::{Protocol, TxOptions};
use crate::packet::{LayerAttributes, PacketView};
use crate::stack::NetworkStack;
use crate::{RxError, StackError, StackResult, TxError};

const VERSION: u8 = 4;
// Header length in 32 bit words. 5 means no option fields.
const HEADER_LENGTH: u8 = 5;
const NO_FLAGS: u8 = 0b000;
const DONT_FRAGMENT: u8 = 0b010;

/// Called when a packet arrives with TTL zero, after the IP layer has been
/// recorded on the packet. ICMP registers itself here to answer with
/// time-exceeded errors.
pub trait TtlExceededHandler: Send + Sync {
    fn handle_ttl_exceeded(&self, stack: &NetworkStack, packet: &PacketView) -> StackResult<()>;
}

pub struct Ipv4Protocol {
    ttl: u8,
    ttl_exceeded_handlers: Mutex<Vec<Arc<dyn TtlExceededHandler>>>,
}

impl Ipv4Protocol {
    pub const NAME: &'static str = "ipv4";
    /// The name of the layer this protocol records on received packets.
    pub const LAYER: &'static str = "ip";

    pub fn new(ttl: u8) -> Ipv4Protocol {
        Ipv4Protocol {
            ttl,
            ttl_exceeded_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn register_ttl_exceeded_handler(&self, handler: Arc<dyn TtlExceededHandler>) {
        self.ttl_exceeded_handlers
            .lock()
            .expect("Unable to lock ttl handlers")
            .push(handler);
    }

    fn ttl_exceeded(&self, stack: &NetworkStack, packet: &PacketView) {
        let handlers = self
            .ttl_exceeded_handlers
            .lock()
            .expect("Unable to lock ttl handlers")
            .clone();
        for handler in handlers {
            if let Err(e) = handler.handle_ttl_exceeded(stack, packet) {
                warn!("ttl exceeded handler failed: {}", e);
            }
        }
    }
}

impl Protocol for Ipv4Protocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn wire_id(&self) -> Option<u16> {
        Some(EtherTypes::Ipv4.0)
    }

    fn build(
        &self,
        _stack: &NetworkStack,
        adapter: &Arc<dyn NetworkAdapter>,
        payload: Vec<u8>,
        options: &mut TxOptions,
    ) -> StackResult<Vec<u8>> {
        let dst_ip = options.dst_ip.ok_or(StackError::MissingTxOption("dst_ip"))?;
        let protocol = options
            .previous_protocol_id
            .ok_or(StackError::MissingTxOption("previous_protocol_id"))?;
        if protocol > u16::from(u8::max_value()) {
            return Err(StackError::IllegalArgument);
        }
        let total_length = Ipv4Packet::minimum_packet_size() + payload.len();
        if total_length > usize::from(u16::max_value()) {
            return Err(StackError::TxError(TxError::TooLargePayload));
        }

        let mut buffer = vec![0; total_length];
        {
            let mut pkg = MutableIpv4Packet::new(&mut buffer).unwrap();
            pkg.set_version(VERSION);
            pkg.set_header_length(HEADER_LENGTH);
            pkg.set_dscp(0);
            pkg.set_ecn(0);
            pkg.set_total_length(total_length as u16);
            pkg.set_identification(0);
            pkg.set_flags(NO_FLAGS);
            pkg.set_fragment_offset(0);
            pkg.set_ttl(self.ttl);
            pkg.set_next_level_protocol(IpNextHeaderProtocol(protocol as u8));
            pkg.set_source(adapter.ip());
            pkg.set_destination(dst_ip);
            pkg.set_payload(&payload);
            let header_checksum = checksum(&pkg.to_immutable());
            pkg.set_checksum(header_checksum);
        }
        Ok(buffer)
    }

    fn handle(
        &self,
        stack: &NetworkStack,
        packet: &mut PacketView,
        adapter: &Arc<dyn NetworkAdapter>,
    ) -> Result<Option<u16>, RxError> {
        let window_len = packet.current().len();
        let (src, dst, ttl, protocol, tail_size) = {
            let ip_pkg = Ipv4Packet::new(packet.current()).ok_or(RxError::InvalidLength)?;
            if ip_pkg.get_checksum() != checksum(&ip_pkg) {
                return Err(RxError::InvalidChecksum);
            }
            if ip_pkg.get_version() != VERSION || ip_pkg.get_header_length() != HEADER_LENGTH {
                return Err(RxError::InvalidContent);
            }
            let flags = ip_pkg.get_flags();
            if (flags != NO_FLAGS && flags != DONT_FRAGMENT) || ip_pkg.get_fragment_offset() != 0 {
                // Fragments are not supported
                return Err(RxError::InvalidContent);
            }
            let total_length = usize::from(ip_pkg.get_total_length());
            if total_length < Ipv4Packet::minimum_packet_size() || total_length > window_len {
                return Err(RxError::InvalidLength);
            }
            if ip_pkg.get_destination() != adapter.ip() {
                trace!("ipv4 packet for {} is not for us", ip_pkg.get_destination());
                return Ok(None);
            }
            (
                ip_pkg.get_source(),
                ip_pkg.get_destination(),
                ip_pkg.get_ttl(),
                ip_pkg.get_next_level_protocol(),
                // Frames shorter than the ethernet minimum arrive padded;
                // the padding goes into the layer tail so the window is
                // exactly the datagram.
                window_len - total_length,
            )
        };
        packet.add_layer(
            Self::LAYER,
            LayerAttributes::Ipv4 { src, dst },
            Ipv4Packet::minimum_packet_size(),
            tail_size,
        )?;

        if ttl == 0 {
            debug!("packet from {} arrived with ttl 0", src);
            self.ttl_exceeded(stack, packet);
            return Ok(None);
        }
        Ok(Some(u16::from(protocol.0)))
    }
}
