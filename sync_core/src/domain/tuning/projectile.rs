/// Gameplay tuning for projectiles fired by ranged classes.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    /// Projectile speed in pixels per second.
    pub speed: f32,

    /// Lifetime in milliseconds before the projectile expires.
    pub ttl_ms: u64,

    /// Collision radius in pixels.
    pub radius: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 450.0,
            ttl_ms: 1200,
            radius: 6.0,
        }
    }
}
