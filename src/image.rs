use std::fmt;

use crate::error::AsmErrorKind;

/// Size of the address space, in bytes.
pub const MEMORY_SIZE: usize = 0x10000;

/// Assembled memory image covering the whole address space.
pub struct Image {
    mem: Box<[u8; MEMORY_SIZE]>,
    /// Highest address written so far
    end: Option<u16>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

impl Image {
    pub fn new() -> Self {
        Image {
            mem: Box::new([0; MEMORY_SIZE]),
            end: None,
        }
    }

    /// Write `bytes` starting at `pos`. Fails without writing if any byte would land past 0xFFFF.
    pub fn write(&mut self, pos: u32, bytes: &[u8]) -> Result<(), AsmErrorKind> {
        let start = pos as usize;
        let stop = start + bytes.len();
        if stop > MEMORY_SIZE {
            return Err(AsmErrorKind::MemoryOverflow);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        self.mem[start..stop].copy_from_slice(bytes);
        let last = (stop - 1) as u16;
        self.end = Some(self.end.map_or(last, |end| end.max(last)));
        Ok(())
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mem[..]
    }

    pub fn end(&self) -> Option<u16> {
        self.end
    }

    /// Prefix of the image up to and including the highest written address.
    pub fn used(&self) -> &[u8] {
        match self.end {
            Some(end) => &self.mem[..=end as usize],
            None => &[],
        }
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_tracks_end() {
        let mut image = Image::new();
        assert!(image.used().is_empty());
        image.write(0x10, &[1, 2, 3]).unwrap();
        image.write(0x02, &[9]).unwrap();
        assert_eq!(image.end(), Some(0x12));
        assert_eq!(image.used().len(), 0x13);
        assert_eq!(image.get(0x11), 2);
        assert_eq!(image.get(0x02), 9);
        assert_eq!(image.as_bytes().len(), MEMORY_SIZE);
    }

    #[test]
    fn last_byte_fits() {
        let mut image = Image::new();
        image.write(0xFFFF, &[0xAA]).unwrap();
        assert_eq!(image.get(0xFFFF), 0xAA);
        assert_eq!(image.end(), Some(0xFFFF));
    }

    #[test]
    fn overflow_writes_nothing() {
        let mut image = Image::new();
        assert_eq!(
            image.write(0xFFFE, &[1, 2, 3]),
            Err(AsmErrorKind::MemoryOverflow)
        );
        assert_eq!(image.get(0xFFFE), 0);
        assert_eq!(image.end(), None);
        assert_eq!(image.write(0x10000, &[1]), Err(AsmErrorKind::MemoryOverflow));
    }

    #[test]
    fn debug_shows_end_only() {
        let mut image = Image::new();
        image.write(3, &[0xFF]).unwrap();
        assert_eq!(format!("{image:?}"), "Image { end: Some(3), .. }");
    }
}
