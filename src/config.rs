#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub frames_max: usize,
    pub stack_max: usize,
    pub initial_gc_threshold: usize,
    /// After a collection the next threshold is the surviving bytes times
    /// this factor.
    pub gc_growth_factor: usize,
    pub stress_gc: bool,
}

impl Config {
    pub const FRAMES_MAX: usize = 64;
    pub const LOCALS_MAX: usize = u8::MAX as usize + 1;

    pub fn with_frames_max(mut self, frames_max: usize) -> Self {
        self.frames_max = frames_max;
        self
    }

    pub fn with_stack_max(mut self, stack_max: usize) -> Self {
        self.stack_max = stack_max;
        self
    }

    pub fn with_initial_gc_threshold(mut self, bytes: usize) -> Self {
        self.initial_gc_threshold = bytes;
        self
    }

    pub fn with_gc_growth_factor(mut self, factor: usize) -> Self {
        self.gc_growth_factor = factor.max(1);
        self
    }

    pub fn with_stress_gc(mut self, stress_gc: bool) -> Self {
        self.stress_gc = stress_gc;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            frames_max: Config::FRAMES_MAX,
            stack_max: Config::FRAMES_MAX * Config::LOCALS_MAX,
            initial_gc_threshold: 1024 * 1024,
            gc_growth_factor: 2,
            stress_gc: cfg!(feature = "debug_stress_gc"),
        }
    }
}
