mod properties;
mod tunnel;
mod version;
