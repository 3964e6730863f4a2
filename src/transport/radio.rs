//! Hardware-backed [Transport] over the `radio` crate traits.

use std::fmt::Debug;
use std::marker::PhantomData;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, trace, warn};
use radio::{Receive, Transmit};
use ringbuf::{HeapRb, Rb};

use super::frame::{self, Header};
use super::Transport;
use crate::address::BROADCAST;

/// Inbound frames buffered between `update` ticks before the oldest is
/// overwritten.
const RX_QUEUE_FRAMES: usize = 8;

/// Transmit completion poll: attempts x interval.
const TX_POLL_ATTEMPTS: usize = 50;
const TX_POLL_DELAY_MS: u32 = 10;

/// Everything the transport needs from a physical radio module.
///
/// Kept generic over the channel, packet-info and error types so any
/// `radio`-crate driver fits; nothing here names a specific modem.
pub trait Radio<C, I, E>:
    Transmit<Error = E>
    + Receive<Info = I, Error = E>
    + radio::Channel<Channel = C, Error = E>
    + DelayMs<u32>
{
}

impl<C, I, E, T> Radio<C, I, E> for T where
    T: Transmit<Error = E>
        + Receive<Info = I, Error = E>
        + radio::Channel<Channel = C, Error = E>
        + DelayMs<u32>
{
}

/// [Transport] implementation for a physical radio module.
///
/// Owns the channel table and the bound address, keeps a bounded inbound
/// queue, and drops frames not addressed to this node or the broadcast
/// sentinel. Radio faults are logged and reported as link-layer refusal
/// (`false`/`None`), which is the only signal the protocol acts on.
pub struct RadioTransport<'a, T, C, I, E>
where
    T: Radio<C, I, E>,
    C: Debug,
    E: Debug,
{
    radio: T,
    channels: &'a [C],
    address: u16,
    rx_queue: HeapRb<(Header, Vec<u8>)>,
    rx_front: Option<(Header, Vec<u8>)>,
    phantom: PhantomData<(I, E)>,
}

impl<'a, T, C, I, E> RadioTransport<'a, T, C, I, E>
where
    T: Radio<C, I, E>,
    C: Debug,
    E: Debug,
{
    pub fn new(radio: T, channels: &'a [C]) -> Self {
        assert!(!channels.is_empty(), "No channel declared!");
        Self {
            radio,
            channels,
            address: BROADCAST,
            rx_queue: HeapRb::new(RX_QUEUE_FRAMES),
            rx_front: None,
            phantom: PhantomData,
        }
    }

    /// Drains everything the radio has received into the inbound queue,
    /// dropping frames meant for other nodes.
    fn poll(&mut self) {
        loop {
            match self.radio.check_receive(true) {
                Ok(true) => {}
                Ok(false) => return,
                Err(err) => {
                    warn!("radio receive check failed: {:?}", err);
                    return;
                }
            }
            let mut buf = [0u8; 256];
            let size = match self.radio.get_received(&mut buf) {
                Ok((size, _info)) => size,
                Err(err) => {
                    warn!("radio receive failed: {:?}", err);
                    continue;
                }
            };
            match frame::decode(&buf[..size]) {
                Ok((header, body)) => {
                    if header.to != self.address && header.to != BROADCAST {
                        trace!("dropping frame for 0o{:o}", header.to);
                        continue;
                    }
                    self.rx_queue.push_overwrite((header, body.to_vec()));
                }
                Err(err) => {
                    warn!("dropping undecodable frame: {}", err);
                }
            }
        }
    }

    fn fill_front(&mut self) {
        if self.rx_front.is_none() {
            self.poll();
            self.rx_front = self.rx_queue.pop();
        }
    }

    fn resume_listening(&mut self) {
        if let Err(err) = self.radio.start_receive() {
            warn!("failed to resume reception: {:?}", err);
        }
    }
}

impl<'a, T, C, I, E> Transport for RadioTransport<'a, T, C, I, E>
where
    T: Radio<C, I, E>,
    C: Debug,
    E: Debug,
{
    fn configure(&mut self, channel: u8, address: u16) {
        self.address = address;
        let Some(radio_channel) = self.channels.get(channel as usize) else {
            warn!(
                "channel {} not in the {}-entry channel table",
                channel,
                self.channels.len()
            );
            return;
        };
        if let Err(err) = self.radio.set_channel(radio_channel) {
            warn!("failed to select channel {}: {:?}", channel, err);
        }
        self.resume_listening();
        debug!("listening on channel {} as 0o{:o}", channel, address);
    }

    fn write(&mut self, header: &Header, body: &[u8]) -> bool {
        let bytes = match frame::encode(header, body) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("refusing to transmit: {}", err);
                return false;
            }
        };
        if let Err(err) = self.radio.start_transmit(&bytes) {
            warn!("transmit failed: {:?}", err);
            self.resume_listening();
            return false;
        }
        let mut done = false;
        for _ in 0..TX_POLL_ATTEMPTS {
            match self.radio.check_transmit() {
                Ok(true) => {
                    done = true;
                    break;
                }
                Ok(false) => self.radio.delay_ms(TX_POLL_DELAY_MS),
                Err(err) => {
                    warn!("transmit check failed: {:?}", err);
                    break;
                }
            }
        }
        self.resume_listening();
        if !done {
            warn!("transmit to 0o{:o} did not complete", header.to);
        }
        done
    }

    fn available(&mut self) -> bool {
        self.fill_front();
        self.rx_front.is_some()
    }

    fn peek_header(&mut self) -> Option<Header> {
        self.fill_front();
        self.rx_front.as_ref().map(|(header, _)| *header)
    }

    fn read(&mut self, buf: &mut [u8]) -> Option<(Header, usize)> {
        self.fill_front();
        let (header, body) = self.rx_front.take()?;
        let n = body.len().min(buf.len());
        buf[..n].copy_from_slice(&body[..n]);
        Some((header, n))
    }
}
