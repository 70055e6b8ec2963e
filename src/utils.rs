#[cfg(test)]
pub mod testing {
    use core::fmt;

    use crate::frame::{FrameView, HEIGHT, WIDTH};

    /// A 2D boolean grid for comparing frames in assertions
    ///
    /// Renders itself as a pixel grid on failure, which beats eyeballing
    /// 256 raw bytes.
    #[derive(Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ImageMask([[bool; WIDTH]; HEIGHT]);

    impl ImageMask {
        pub fn new() -> Self {
            Self([[false; WIDTH]; HEIGHT])
        }

        pub fn get(&self, x: usize, y: usize) -> bool {
            self.0[y][x]
        }
    }

    impl fmt::Debug for ImageMask {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let width = self.0[0].len() + 2;
            write!(f, "\n")?;
            for _ in 0..width {
                write!(f, "-")?;
            }
            write!(f, "\n")?;
            for row in &self.0 {
                write!(f, "|")?;
                row.iter()
                    .map(|&p| if p { write!(f, "#") } else { write!(f, ".") })
                    .fold(Ok(()), |acc, r| acc.and(r))?;
                write!(f, "|\n")?;
            }
            for _ in 0..width {
                write!(f, "-")?;
            }
            Ok(())
        }
    }

    pub trait ToMask {
        fn to_mask(&self) -> ImageMask;
    }

    /// Whitespace separates rows, `#` marks a set pixel. Rows and columns
    /// that are left out stay unset, so masks can describe just the corner
    /// a test cares about.
    impl ToMask for str {
        fn to_mask(&self) -> ImageMask {
            let mut mask = ImageMask::new();
            mask.0
                .iter_mut()
                .zip(self.split_whitespace())
                .for_each(|(m_row, c_row)| {
                    m_row
                        .iter_mut()
                        .zip(c_row.chars())
                        .for_each(|(m, c)| *m = c == '#')
                });
            mask
        }
    }

    impl<'a> ToMask for FrameView<'a> {
        fn to_mask(&self) -> ImageMask {
            let mut mask = ImageMask::new();
            self.iter_rows_as_bitslices()
                .zip(mask.0.iter_mut())
                .for_each(|(f_row, m_row)| {
                    m_row
                        .iter_mut()
                        .zip(f_row)
                        .for_each(|(m, f)| *m = *f)
                });
            mask
        }
    }

    mod tests {
        use super::*;

        #[test]
        fn str_to_mask() {
            let mask = "\
                #.#
                .#"
            .to_mask();

            assert!(mask.get(0, 0));
            assert!(!mask.get(1, 0));
            assert!(mask.get(2, 0));
            assert!(!mask.get(0, 1));
            assert!(mask.get(1, 1));
            assert!(!mask.get(63, 31));
        }

        #[test]
        fn frame_view_to_mask() {
            let mut raw = [0u8; crate::frame::MEM_LENGTH];
            raw[0] = 0b1010_0000;
            let mask = FrameView::new(&raw).to_mask();

            assert!(mask.get(0, 0));
            assert!(!mask.get(1, 0));
            assert!(mask.get(2, 0));
            assert!(!mask.get(0, 1));
        }

        #[test]
        fn empty_str_is_empty_mask() {
            assert_eq!("".to_mask(), ImageMask::new());
        }
    }
}
