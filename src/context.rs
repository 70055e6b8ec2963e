//! Context for accessing functionalities of platform that the machine is
//! emulated on.
//!
//! To ensure thread-safety execution, implementators should be `Sync`,
//! although it is not required.

use crate::frame::FrameView;

/// Trait aggregating platform functionalities
pub trait Context {
    /// Draw current frame to the screen
    ///
    /// Called after every mutation of the framebuffer, a sprite blit or a
    /// clear, so a renderer never has to poll
    fn on_frame(&mut self, frame: FrameView<'_>);
    /// Turn sound on
    ///
    /// Called when a nonzero value is stored to the sound timer
    fn sound_on(&mut self);
    /// Turn sound off
    ///
    /// Called by `tick_timers` when the sound timer expires
    fn sound_off(&mut self);
    /// Generate random 8-bit number
    ///
    /// Called whenever requested by executing program
    fn gen_random(&mut self) -> u8;
}

#[cfg(test)]
pub mod testing {
    use super::*;

    use nanorand::{rand::pcg64::Pcg64 as Rng, RNG};

    use crate::utils::testing::{ImageMask, ToMask};

    pub struct TestingContext {
        sound: bool,
        frame: Option<ImageMask>,
        rng: Rng,
    }

    impl TestingContext {
        pub fn new(seed: u128) -> Self {
            Self {
                sound: false,
                frame: None,
                rng: Rng::new_seed(seed),
            }
        }

        pub fn is_sound_on(&self) -> bool {
            self.sound
        }

        pub fn get_frame(&self) -> Option<&ImageMask> {
            self.frame.as_ref()
        }
    }

    impl Context for TestingContext {
        fn on_frame(&mut self, frame: FrameView<'_>) {
            self.frame = Some(frame.to_mask());
        }

        fn sound_on(&mut self) {
            self.sound = true;
        }

        fn sound_off(&mut self) {
            self.sound = false;
        }

        fn gen_random(&mut self) -> u8 {
            self.rng.generate::<u8>()
        }
    }

    #[test]
    fn testing_context() {
        let mut ctx = TestingContext::new(0);

        let mut raw = [0u8; crate::frame::MEM_LENGTH];
        raw[0] = 0b1100_0000;
        ctx.on_frame(FrameView::new(&raw));
        assert_eq!(
            ctx.get_frame(),
            Some(
                &"\
                ##"
                .to_mask()
            ),
        );

        ctx.sound_on();
        assert!(ctx.is_sound_on());

        ctx.sound_off();
        assert!(!ctx.is_sound_on());
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut lhs = TestingContext::new(42);
        let mut rhs = TestingContext::new(42);
        for _ in 0..8 {
            assert_eq!(lhs.gen_random(), rhs.gen_random());
        }
    }
}
