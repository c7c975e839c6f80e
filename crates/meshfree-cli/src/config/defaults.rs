pub struct DefaultsConfig {
    pub radius: f64,
    pub verify: bool,
    pub alpha: f64,
    pub beta: f64,
    pub diameter: f64,
    pub pairs_name: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            verify: false,
            alpha: 0.0,
            beta: 1e-3,
            diameter: 1.0,
            pairs_name: "contacts".to_string(),
        }
    }
}
