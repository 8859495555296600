//! In-process simulated bus populated with register-file devices
//!
//! Each device models the common I2C register convention: the first byte of a
//! write sets the register pointer, further bytes are stored starting there,
//! and reads return bytes from the pointer. The pointer auto-increments and
//! wraps at 256. Addresses with no device attached do not acknowledge.

use indexmap::IndexMap;
use log::{debug, trace};

use super::{BusError, BusTransport, Message, Operation};
use crate::{
    compiler::transaction::hex_bytes,
    token::{Address, Direction},
};

/// A simulated device with 256 byte-wide registers
#[derive(Debug, Clone)]
pub struct RegisterDevice {
    registers: [u8; 256],
    pointer: u8,
}

impl Default for RegisterDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterDevice {
    pub fn new() -> Self {
        Self {
            registers: [0; 256],
            pointer: 0,
        }
    }

    /// A device whose registers starting at `first` hold `values`
    pub fn with_registers(first: u8, values: &[u8]) -> Self {
        let mut device = Self::new();
        for (offset, &value) in values.iter().enumerate() {
            device.set_register(first.wrapping_add(offset as u8), value);
        }
        device
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers[usize::from(register)]
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[usize::from(register)] = value;
    }

    /// Current register pointer
    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&pointer, values)) = bytes.split_first() else {
            return;
        };
        self.pointer = pointer;
        for &value in values {
            self.set_register(self.pointer, value);
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        for slot in buffer {
            *slot = self.register(self.pointer);
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

/// One message as the simulated bus observed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub address: Address,
    pub direction: Direction,
    /// Bytes written, or bytes returned for a read
    pub data: Vec<u8>,
}

/// Simulated bus of [`RegisterDevice`]s
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    devices: IndexMap<Address, RegisterDevice>,
    transactions: Vec<Vec<TransferRecord>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device, replacing any device already at `address`
    pub fn attach(&mut self, address: Address, device: RegisterDevice) -> &mut Self {
        self.devices.insert(address, device);
        self
    }

    pub fn device(&self, address: Address) -> Option<&RegisterDevice> {
        self.devices.get(&address)
    }

    pub fn device_mut(&mut self, address: Address) -> Option<&mut RegisterDevice> {
        self.devices.get_mut(&address)
    }

    /// Every transaction seen so far, including failed ones up to the failure
    pub fn transactions(&self) -> &[Vec<TransferRecord>] {
        &self.transactions
    }
}

impl BusTransport for MemoryBus {
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<usize, BusError> {
        let mut records = Vec::with_capacity(messages.len());
        let mut outcome = Ok(messages.len());

        for message in messages.iter_mut() {
            let address = message.address;
            let Some(device) = self.devices.get_mut(&address) else {
                debug!("No device at {address}, transaction aborted with NACK");
                outcome = Err(BusError::NoAcknowledge { address });
                break;
            };

            let record = match &mut message.op {
                Operation::Write(bytes) => {
                    device.write(bytes);
                    TransferRecord {
                        address,
                        direction: Direction::Write,
                        data: bytes.to_vec(),
                    }
                }
                Operation::Read(buffer) => {
                    device.read(buffer);
                    TransferRecord {
                        address,
                        direction: Direction::Read,
                        data: buffer.to_vec(),
                    }
                }
            };
            trace!(
                "{} {address}: [{}]",
                record.direction.tag(),
                hex_bytes(&record.data)
            );
            records.push(record);
        }

        self.transactions.push(records);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(raw: u8) -> Address {
        Address::new(raw).expect("valid address")
    }

    #[test]
    fn test_register_pointer_auto_increments() {
        let mut device = RegisterDevice::new();
        device.write(&[0x10, 0xaa, 0xbb]);
        assert_eq!(device.register(0x10), 0xaa);
        assert_eq!(device.register(0x11), 0xbb);
        assert_eq!(device.pointer(), 0x12);

        device.write(&[0x10]);
        let mut buffer = [0; 2];
        device.read(&mut buffer);
        assert_eq!(buffer, [0xaa, 0xbb]);
    }

    #[test]
    fn test_register_pointer_wraps() {
        let mut device = RegisterDevice::with_registers(0xff, &[0x01, 0x02]);
        assert_eq!(device.register(0xff), 0x01);
        assert_eq!(device.register(0x00), 0x02);

        device.write(&[0xff]);
        let mut buffer = [0; 2];
        device.read(&mut buffer);
        assert_eq!(buffer, [0x01, 0x02]);
    }

    #[test]
    fn test_absent_device_nacks() {
        let mut bus = MemoryBus::new();
        bus.attach(address(0x1c), RegisterDevice::new());

        let mut messages = [
            Message {
                address: address(0x1c),
                op: Operation::Write(&[0x00, 0x01]),
            },
            Message {
                address: address(0x50),
                op: Operation::Write(&[0x00]),
            },
        ];
        let err = bus.transfer(&mut messages).unwrap_err();
        assert!(matches!(err, BusError::NoAcknowledge { address } if address.get() == 0x50));

        // The segment ahead of the NACK already landed
        assert_eq!(bus.transactions()[0].len(), 1);
        assert_eq!(bus.device(address(0x1c)).unwrap().register(0x00), 0x01);
    }
}
