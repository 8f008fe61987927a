// src/cap/geometry.rs
//! `<area>` geometry: WGS84 polygons and circles, parsed from their CAP text form.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// `"lat,lon"`; rejects out-of-range coordinates.
    pub fn parse(pair: &str) -> Option<Self> {
        let (lat, lon) = pair.trim().split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    pub points: Vec<GeoPoint>,
}

impl Polygon {
    /// `"lat,lon lat,lon ..."`. Any bad pair rejects the whole polygon.
    pub fn parse(raw: &str) -> Option<Self> {
        let points = raw
            .split_whitespace()
            .map(GeoPoint::parse)
            .collect::<Option<Vec<_>>>()?;
        if points.is_empty() {
            return None;
        }
        Some(Self { points })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl Circle {
    /// `"lat,lon radius"` with the radius in kilometres.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let center = GeoPoint::parse(parts.next()?)?;
        let radius_km: f64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || !radius_km.is_finite() || radius_km < 0.0 {
            return None;
        }
        Some(Self { center, radius_km })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geocode {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Area {
    pub description: String,
    pub polygons: Vec<Polygon>,
    pub circles: Vec<Circle>,
    pub geocodes: Vec<Geocode>,
}

impl Area {
    pub fn has_geometry(&self) -> bool {
        !self.polygons.is_empty() || !self.circles.is_empty()
    }
}
