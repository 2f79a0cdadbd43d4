//! Advertising and scan response payload assembly
//!
//! An advertising or scan response payload is at most [`MAX_PAYLOAD_SIZE`] bytes of AD
//! structures. The [`AdvertisingData`] type owns such a payload and keeps the sequence of
//! structures contiguous and well formed while they are added, merged, updated, and looked up.
//! The payload is handed to a radio driver with [`payload`](AdvertisingData::payload).

use crate::assigned::{AdStruct, AdStructIterator, AdType, MergeClass, HEADER_SIZE};
use core::fmt;

/// The maximum size of an advertising or scan response payload
pub const MAX_PAYLOAD_SIZE: usize = 31;

/// Errors from the operations of [`AdvertisingData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// The operation would grow the payload past [`MAX_PAYLOAD_SIZE`]
    DataTooLarge {
        /// The number of bytes that would not fit within the payload
        overflow: usize,
        /// The number of bytes remaining in the payload at the time of the error
        remaining: usize,
    },
    /// The AD type is already within the payload and does not support repeated adds
    UnsupportedUpdate,
    /// No AD structure matched the type and size to be updated
    FieldNotFound,
    /// Data was required for the operation but none was given
    InvalidParameter,
    /// The advertising data cannot be used for the operation
    ///
    /// This is not returned by any operation of this crate. It exists for owners of an
    /// `AdvertisingData` that gate its use behind their own setup state, so that their status
    /// surface is the same as this crate's.
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::DataTooLarge { overflow, remaining } => write!(
                f,
                "advertising data too large, {} byte(s) would not fit within the {} remaining",
                overflow, remaining
            ),
            Error::UnsupportedUpdate => f.write_str("the AD type does not support repeated adds"),
            Error::FieldNotFound => f.write_str("no AD structure matched the type and size"),
            Error::InvalidParameter => f.write_str("data is required for the operation"),
            Error::InvalidState => f.write_str("the advertising data is not usable"),
        }
    }
}

/// Advertising data
///
/// This is the payload of an advertising or scan response packet. It is made up of AD
/// structures, of which as many can be added as fit within [`MAX_PAYLOAD_SIZE`] bytes. The
/// payload always decodes as a contiguous sequence of well formed structures, and an operation
/// that fails leaves it untouched.
///
/// Adding a type that is already within the payload is resolved by the type's
/// [`MergeClass`]: the structure's data is either replaced or extended, or the add is rejected.
/// [`try_update`](AdvertisingData::try_update) is the stricter path for refreshing the data of
/// an existing structure without moving anything.
///
/// ```
/// use adv_data::AdvertisingData;
/// use adv_data::assigned::AdType;
///
/// let mut adv_data = AdvertisingData::new();
///
/// adv_data.add_flags(0x06).unwrap();
///
/// adv_data.try_add(AdType::CompleteListOf16bitServiceUuids, &[0x0F, 0x18]).unwrap();
///
/// assert_eq!(adv_data.payload(), &[2, 0x01, 0x06, 3, 0x03, 0x0F, 0x18]);
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisingData {
    length: usize,
    payload: [u8; MAX_PAYLOAD_SIZE],
    appearance: u16,
}

impl AdvertisingData {
    /// Create an empty advertising data
    pub fn new() -> Self {
        AdvertisingData::default()
    }

    /// Add or merge an AD structure
    ///
    /// When no structure of `ad_type` is within the payload, a new structure is appended at the
    /// end. Otherwise the existing structure is merged with `data` according to the
    /// [`MergeClass`] of `ad_type`.
    ///
    /// # Errors
    /// [`DataTooLarge`](Error::DataTooLarge) when the resulting payload would be larger than
    /// [`MAX_PAYLOAD_SIZE`]. The payload is not modified by a failed add.
    pub fn try_add(&mut self, ad_type: AdType, data: &[u8]) -> Result<(), Error> {
        self.try_add_raw(ad_type.val(), data)
    }

    /// Add or merge an AD structure by its raw type value
    ///
    /// This is [`try_add`](AdvertisingData::try_add) for assigned numbers outside of [`AdType`].
    /// Such types have no defined merge semantics, so while the first add appends a new
    /// structure, adding the same type again fails with
    /// [`UnsupportedUpdate`](Error::UnsupportedUpdate).
    pub fn try_add_raw(&mut self, type_tag: u8, data: &[u8]) -> Result<(), Error> {
        match self.find_offset(type_tag) {
            None => self.append_structure(type_tag, data),
            Some(offset) => match MergeClass::of(type_tag) {
                MergeClass::Replace => self.replace_structure(offset, type_tag, data),
                MergeClass::Append => self.extend_structure(offset, type_tag, data),
                MergeClass::Unsupported => Err(Error::UnsupportedUpdate),
            },
        }
    }

    /// Update the data of an AD structure in place
    ///
    /// This overwrites the data of the structure matching both `ad_type` and the size of `data`.
    /// Nothing within the payload is moved and its length never changes, which makes this the
    /// cheap path for values that change often, such as a counter within manufacturer specific
    /// data.
    ///
    /// # Errors
    /// [`InvalidParameter`](Error::InvalidParameter) when `data` is empty, and
    /// [`FieldNotFound`](Error::FieldNotFound) when no structure matches `ad_type` with the
    /// exact size of `data`.
    pub fn try_update(&mut self, ad_type: AdType, data: &[u8]) -> Result<(), Error> {
        self.try_update_raw(ad_type.val(), data)
    }

    /// Update the data of an AD structure in place by its raw type value
    pub fn try_update_raw(&mut self, type_tag: u8, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Err(Error::InvalidParameter);
        }

        let mut offset = 0;

        while offset + HEADER_SIZE <= self.length {
            let len = self.payload[offset] as usize;

            if len == 0 {
                break;
            }

            if self.payload[offset + 1] == type_tag && len == data.len() + 1 {
                self.payload[offset + HEADER_SIZE..offset + HEADER_SIZE + data.len()].copy_from_slice(data);

                log::trace!("updated AD structure data (type {:#04x})", type_tag);

                return Ok(());
            }

            offset += len + 1;
        }

        Err(Error::FieldNotFound)
    }

    /// Find the AD structure for an AD type
    ///
    /// The first structure of `ad_type` within the payload is returned, or `None` when the type
    /// is not present.
    pub fn find(&self, ad_type: AdType) -> Option<AdStruct<'_>> {
        self.find_raw(ad_type.val())
    }

    /// Find the AD structure for a raw AD type value
    pub fn find_raw(&self, type_tag: u8) -> Option<AdStruct<'_>> {
        self.find_offset(type_tag).and_then(|offset| {
            AdStruct::try_new(&self.payload[offset..self.length])
                .ok()
                .flatten()
                .map(|(ad, _)| ad)
        })
    }

    /// Remove all AD structures
    ///
    /// The full payload capacity is zeroed and the length is reset. Clearing an already empty
    /// advertising data does nothing.
    pub fn clear(&mut self) {
        self.payload = [0; MAX_PAYLOAD_SIZE];

        self.length = 0;

        log::trace!("cleared advertising data");
    }

    /// Get the payload
    ///
    /// The return is only the occupied bytes of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.length]
    }

    /// Get the number of occupied bytes within the payload
    pub fn payload_len(&self) -> usize {
        self.length
    }

    /// Get the cached appearance value
    ///
    /// This is the value of the last successful
    /// [`add_appearance`](AdvertisingData::add_appearance), kept so that readers do not need to
    /// scan the payload. It is zero when no appearance was ever added. The payload itself stays
    /// authoritative for what is broadcast.
    pub fn appearance(&self) -> u16 {
        self.appearance
    }

    /// Get the remaining amount of space available for AD structures
    pub fn remaining_space(&self) -> usize {
        MAX_PAYLOAD_SIZE - self.length
    }

    /// Iterate over the AD structures within the payload
    pub fn iter(&self) -> AdStructIterator<'_> {
        AdStructIterator::new(self.payload())
    }

    /// Add the Flags AD type
    ///
    /// `flags` is a combination of [`CoreFlag`](crate::assigned::flags::CoreFlag) masks.
    pub fn add_flags(&mut self, flags: u8) -> Result<(), Error> {
        self.try_add(AdType::Flags, &[flags])
    }

    /// Add the Appearance AD type
    ///
    /// On success the value is also cached for [`appearance`](AdvertisingData::appearance).
    pub fn add_appearance(&mut self, appearance: u16) -> Result<(), Error> {
        self.try_add(AdType::Appearance, &appearance.to_le_bytes())?;

        self.appearance = appearance;

        Ok(())
    }

    /// Add the TX Power Level AD type
    ///
    /// `tx_power` is in dBm.
    pub fn add_tx_power(&mut self, tx_power: i8) -> Result<(), Error> {
        self.try_add(AdType::TxPowerLevel, &tx_power.to_le_bytes())
    }

    /// Find the offset of the length byte of the first structure with `type_tag`
    ///
    /// This is the lookup scan behind every merge and find operation. It never reads past the
    /// occupied bytes, and a zero length byte ends the scan early.
    fn find_offset(&self, type_tag: u8) -> Option<usize> {
        let mut offset = 0;

        while offset + HEADER_SIZE <= self.length {
            let len = self.payload[offset] as usize;

            if len == 0 {
                break;
            }

            if self.payload[offset + 1] == type_tag {
                return Some(offset);
            }

            offset += len + 1;
        }

        None
    }

    /// Append a new structure at the end of the payload
    fn append_structure(&mut self, type_tag: u8, data: &[u8]) -> Result<(), Error> {
        let size = data.len() + HEADER_SIZE;

        if self.length + size > MAX_PAYLOAD_SIZE {
            return Err(self.data_too_large(self.length + size - MAX_PAYLOAD_SIZE));
        }

        self.payload[self.length] = (data.len() + 1) as u8;

        self.payload[self.length + 1] = type_tag;

        self.payload[self.length + HEADER_SIZE..self.length + size].copy_from_slice(data);

        self.length += size;

        log::trace!("appended AD structure (type {:#04x}, {} data bytes)", type_tag, data.len());

        Ok(())
    }

    /// Replace the data of the structure at `offset`
    ///
    /// Same sized data is overwritten where it is. Differently sized data removes the structure,
    /// closes the gap, and appends a structure with the new data at the end of the payload.
    fn replace_structure(&mut self, offset: usize, type_tag: u8, data: &[u8]) -> Result<(), Error> {
        let old_data_len = self.payload[offset] as usize - 1;

        if data.len() == old_data_len {
            self.payload[offset + HEADER_SIZE..offset + HEADER_SIZE + data.len()].copy_from_slice(data);

            log::trace!("replaced AD structure data (type {:#04x})", type_tag);

            Ok(())
        } else {
            if self.length - old_data_len + data.len() > MAX_PAYLOAD_SIZE {
                return Err(self.data_too_large(self.length - old_data_len + data.len() - MAX_PAYLOAD_SIZE));
            }

            let removed = old_data_len + HEADER_SIZE;

            self.payload.copy_within(offset + removed..self.length, offset);

            self.length -= removed;

            self.append_structure(type_tag, data)
        }
    }

    /// Extend the data of the structure at `offset` with `data`
    ///
    /// A gap is opened directly after the structure's data, everything past it is shifted
    /// towards the end of the payload, and `data` is copied into the gap.
    fn extend_structure(&mut self, offset: usize, type_tag: u8, data: &[u8]) -> Result<(), Error> {
        if self.length + data.len() > MAX_PAYLOAD_SIZE {
            return Err(self.data_too_large(self.length + data.len() - MAX_PAYLOAD_SIZE));
        }

        // the end of the structure's data, where the gap is opened
        let gap = offset + 1 + self.payload[offset] as usize;

        self.payload.copy_within(gap..self.length, gap + data.len());

        self.payload[gap..gap + data.len()].copy_from_slice(data);

        self.payload[offset] += data.len() as u8;

        self.length += data.len();

        log::trace!("extended AD structure (type {:#04x}) by {} bytes", type_tag, data.len());

        Ok(())
    }

    fn data_too_large(&self, overflow: usize) -> Error {
        Error::DataTooLarge {
            overflow,
            remaining: self.remaining_space(),
        }
    }
}
