//! SPI framing for register access
//!
//! Every transfer starts with a 32-bit message header carrying the direction, the number of
//! words to read and the word address. Payloads are capped at [`SIZE_SPI_MSG_MAXLEN`] bytes;
//! [`send_long_packed_buf`] splits larger buffers into consecutive messages.

use std::io;

use tracing::trace;

use crate::packing::{field, PackingOp};

pub const SIZE_SPI_MSG_HEADER: usize = 4;
pub const SIZE_SPI_MSG_MAXLEN: usize = 64 * 4;

/// Direction of an SPI message, as encoded in the header access bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiOp {
    Read = 0,
    Write = 1,
}

/// A full-duplex SPI bus with the switch as its only device
///
/// `tx` and `rx` have the same length; the switch answers a read header by clocking the
/// requested words out over the bytes that follow it.
#[allow(async_fn_in_trait)]
pub trait SpiTransport {
    async fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()>;
}

/// Registers with a fixed SPI word address
pub trait RegisterAddress {
    /// Returns the address of this particular struct
    fn address() -> u64;
}

/// Auto generates the trait impl from an enum of addresses
#[macro_export]
macro_rules! register_address {
    ($addrs:ident, $reg:ident) => {
        $crate::register_address!($addrs, $reg, $reg);
    };
    // Several layouts of the same register
    ($addrs:ident, $reg:ident, $variant:ident) => {
        impl RegisterAddress for $reg {
            fn address() -> u64 {
                $addrs::$variant as u64
            }
        }
    };
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpiMessage {
    pub access: u64,
    pub read_count: u64,
    pub address: u64,
}

impl SpiMessage {
    pub fn packing(buf: &mut [u8], msg: &mut Self, op: PackingOp) {
        let buf = &mut buf[..SIZE_SPI_MSG_HEADER];
        field(buf, &mut msg.access, 31, 31, op);
        field(buf, &mut msg.read_count, 30, 25, op);
        field(buf, &mut msg.address, 24, 4, op);
    }
}

fn too_long(len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("SPI message of {len} bytes is longer than the maximum of {SIZE_SPI_MSG_MAXLEN}"),
    )
}

fn not_whole_words(len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("SPI message of {len} bytes is not a whole number of 32-bit words"),
    )
}

/// Reads or writes `buf` at register `address` in a single message
///
/// On read, `buf` is overwritten with what the switch returned. The length must be a
/// multiple of 4, since the header counts whole words.
pub async fn send_packed_buf<T: SpiTransport>(
    spi: &mut T,
    op: SpiOp,
    address: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    if buf.len() > SIZE_SPI_MSG_MAXLEN {
        return Err(too_long(buf.len()));
    }
    if buf.len() % 4 != 0 {
        return Err(not_whole_words(buf.len()));
    }
    let msg_len = SIZE_SPI_MSG_HEADER + buf.len();
    let mut tx = vec![0u8; msg_len];
    let mut rx = vec![0u8; msg_len];

    let mut msg = SpiMessage {
        access: op as u64,
        read_count: match op {
            SpiOp::Read => (buf.len() / 4) as u64,
            SpiOp::Write => 0,
        },
        address,
    };
    SpiMessage::packing(&mut tx, &mut msg, PackingOp::Pack);
    if op == SpiOp::Write {
        tx[SIZE_SPI_MSG_HEADER..].copy_from_slice(buf);
    }

    trace!(?op, address, len = buf.len(), "SPI transfer");
    spi.transfer(&tx, &mut rx).await?;

    if op == SpiOp::Read {
        buf.copy_from_slice(&rx[SIZE_SPI_MSG_HEADER..]);
    }
    Ok(())
}

/// Like [`send_packed_buf`], for buffers of any length
///
/// The word address advances by one for every 4 bytes already transferred.
pub async fn send_long_packed_buf<T: SpiTransport>(
    spi: &mut T,
    op: SpiOp,
    base_address: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    if buf.len() % 4 != 0 {
        return Err(not_whole_words(buf.len()));
    }
    let mut address = base_address;
    for chunk in buf.chunks_mut(SIZE_SPI_MSG_MAXLEN) {
        send_packed_buf(spi, op, address, chunk).await?;
        address += (chunk.len() / 4) as u64;
    }
    Ok(())
}

/// Reads or writes a register of 4 or 8 bytes as a big-endian integer
pub async fn send_int<T: SpiTransport>(
    spi: &mut T,
    op: SpiOp,
    address: u64,
    value: &mut u64,
    size: usize,
) -> io::Result<()> {
    if size > 8 {
        return Err(too_long(size));
    }
    if size == 0 || size % 4 != 0 {
        return Err(not_whole_words(size));
    }
    let mut buf = vec![0u8; size];
    if op == SpiOp::Write {
        field(&mut buf, value, 8 * size - 1, 0, PackingOp::Pack);
    }
    send_packed_buf(spi, op, address, &mut buf).await?;
    if op == SpiOp::Read {
        field(&mut buf, value, 8 * size - 1, 0, PackingOp::Unpack);
    }
    Ok(())
}
