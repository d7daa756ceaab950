use std::time::Instant;

// Wall-clock delta source for the frame driver. The first tick after
// construction, pause() or skip() never reports the idle gap, so a renderer
// coming back on screen does not integrate a huge delta.
#[derive(Debug)]
pub struct FrameClock {
    started: Instant,
    last_tick: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> FrameClock {
        FrameClock {
            started: Instant::now(),
            last_tick: None,
        }
    }

    // Seconds since the previous tick; 0.0 on the first tick after a
    // stopped -> running transition.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = match self.last_tick {
            Some(prev) => now.duration_since(prev).as_secs_f32(),
            None => 0.0,
        };
        self.last_tick = Some(now);
        dt
    }

    // A tick happened but the simulation did not run (no drawable surface).
    // Consume the wall-clock gap so the next real tick stays small.
    pub fn skip(&mut self) {
        self.last_tick = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        self.last_tick = None;
    }

    pub fn elapsed(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        FrameClock::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.tick(), 0.0);
    }

    #[test]
    fn delta_is_nonnegative_and_tracks_time() {
        let mut clock = FrameClock::new();
        clock.tick();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let dt = clock.tick();
        assert!(dt >= 0.0);
        assert!(dt >= 0.005, "slept 10ms but dt was {dt}");
    }

    #[test]
    fn pause_resets_the_delta() {
        let mut clock = FrameClock::new();
        clock.tick();
        std::thread::sleep(std::time::Duration::from_millis(5));
        clock.pause();
        assert_eq!(clock.tick(), 0.0);
    }

    #[test]
    fn skip_consumes_the_gap() {
        let mut clock = FrameClock::new();
        clock.tick();
        std::thread::sleep(std::time::Duration::from_millis(20));
        clock.skip();
        let dt = clock.tick();
        assert!(dt < 0.020, "skip should have consumed the 20ms gap, dt {dt}");
    }

    #[test]
    fn elapsed_is_monotonic() {
        let clock = FrameClock::new();
        let a = clock.elapsed();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
