//! Primitive values which can be read from and written to guest memory.

/// A primitive value stored in big endian byte order in guest memory.
pub trait Primitive:
    Copy + Default + PartialEq + std::fmt::Debug + std::fmt::UpperHex + Send + Sync + 'static
{
    /// Size of the primitive, in bytes.
    const SIZE: usize;

    /// Reads the value from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than [`Self::SIZE`].
    fn read_be_bytes(bytes: &[u8]) -> Self;

    /// Writes the value to the start of `bytes`.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than [`Self::SIZE`].
    fn write_be_bytes(self, bytes: &mut [u8]);
}

macro_rules! impl_primitive {
    ($($ty:ty),*) => {
        $(
            impl Primitive for $ty {
                const SIZE: usize = size_of::<$ty>();

                #[inline(always)]
                fn read_be_bytes(bytes: &[u8]) -> Self {
                    let mut buf = [0; size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_be_bytes(buf)
                }

                #[inline(always)]
                fn write_be_bytes(self, bytes: &mut [u8]) {
                    bytes[..size_of::<$ty>()].copy_from_slice(&self.to_be_bytes());
                }
            }
        )*
    };
}

impl_primitive!(u8, u16, u32, u64, i32);
