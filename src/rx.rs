use std::sync::Arc;
use std::thread;

use pnet::datalink::DataLinkReceiver;

use crate::adapter::NetworkAdapter;
use crate::stack::NetworkStack;

/// Spawns the perpetual receive thread for one adapter. Every frame read
/// from `receiver` is handed to the stack, which processes it on a worker
/// of its own so a slow handler here never blocks the device.
/// The thread stops when the receiver returns an error, which is how
/// closing the underlying channel cancels reception.
pub fn spawn(
    stack: Arc<NetworkStack>,
    adapter: Arc<dyn NetworkAdapter>,
    mut receiver: Box<dyn DataLinkReceiver>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match receiver.next() {
            Ok(frame) => stack.add_packet(frame.to_vec(), &adapter),
            Err(e) => {
                error!("adapter {} receive failed, stopping reception: {}", adapter.mac(), e);
                break;
            }
        }
    })
}
