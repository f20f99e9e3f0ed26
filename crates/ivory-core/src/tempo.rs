use ivory_ports::sequence::{TempoPoint, DEFAULT_US_PER_QUARTER};
use ivory_ports::types::Tick;
use std::time::Duration;

/// Piecewise tick-to-time mapping built from a sequence's tempo changes.
#[derive(Clone, Debug)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
}

#[derive(Clone, Copy, Debug)]
struct TempoSegment {
    start_tick: Tick,
    start_us: i64,
    us_per_quarter: u32,
}

impl TempoMap {
    pub fn new(ppq: u16, points: &[TempoPoint]) -> Self {
        let ppq = ppq.max(1);
        let mut points: Vec<TempoPoint> = points
            .iter()
            .copied()
            .filter(|point| point.us_per_quarter > 0)
            .collect();
        points.sort_by_key(|point| point.tick);
        if points.first().map_or(true, |point| point.tick != 0) {
            points.insert(
                0,
                TempoPoint {
                    tick: 0,
                    us_per_quarter: DEFAULT_US_PER_QUARTER,
                },
            );
        }

        let mut segments: Vec<TempoSegment> = Vec::with_capacity(points.len());
        for point in points {
            let start_us = match segments.last() {
                Some(prev) => {
                    prev.start_us
                        + ticks_to_us(point.tick - prev.start_tick, prev.us_per_quarter, ppq)
                }
                None => 0,
            };
            segments.push(TempoSegment {
                start_tick: point.tick,
                start_us,
                us_per_quarter: point.us_per_quarter,
            });
        }

        Self { ppq, segments }
    }

    pub fn tick_to_micros(&self, tick: Tick) -> i64 {
        let seg = self.segment_for_tick(tick);
        seg.start_us + ticks_to_us(tick - seg.start_tick, seg.us_per_quarter, self.ppq)
    }

    pub fn tick_to_duration(&self, tick: Tick) -> Duration {
        Duration::from_micros(self.tick_to_micros(tick).max(0) as u64)
    }

    fn segment_for_tick(&self, tick: Tick) -> TempoSegment {
        let mut current = self.segments[0];
        for seg in &self.segments {
            if seg.start_tick > tick {
                break;
            }
            current = *seg;
        }
        current
    }
}

fn ticks_to_us(ticks: Tick, us_per_quarter: u32, ppq: u16) -> i64 {
    let ticks = ticks as i128;
    let us_per_quarter = us_per_quarter as i128;
    let ppq = ppq as i128;
    ((ticks * us_per_quarter) / ppq) as i64
}
