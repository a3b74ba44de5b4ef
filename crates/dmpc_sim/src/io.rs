//! The external interfaces that are actually files: the trajectory and
//! goal text formats, and the append-only reallocation CSV log.

use std::io::{self, Write};
use std::path::Path;

use dmpc_assignment::{AssignmentChange, ReallocationMode};
use dmpc_linalg::{Float, Point3};

fn write_block<W: Write>(w: &mut W, points: &[Point3]) -> io::Result<()> {
    for axis in 0..3 {
        let row: Vec<String> = points.iter().map(|p| format!("{:.12e}", p[axis])).collect();
        writeln!(w, "{}", row.join(" "))?;
    }
    Ok(())
}

/// Writes the trajectory file: header line, initial positions, goals, then
/// one `3 x K_total` block per commanded agent.
pub fn write_trajectory_file(
    path: impl AsRef<Path>,
    n: usize,
    n_cmd: usize,
    p_min: Point3,
    p_max: Point3,
    po: &[Point3],
    pf: &[Point3],
    trajectories: &[Vec<Point3>],
) -> io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    writeln!(
        f,
        "{n} {n_cmd} {} {} {} {} {} {}",
        p_min[0], p_min[1], p_min[2], p_max[0], p_max[1], p_max[2]
    )?;
    write_block(&mut f, po)?;
    write_block(&mut f, pf)?;
    for trajectory in trajectories {
        write_block(&mut f, trajectory)?;
    }
    Ok(())
}

/// Writes the goal file: `Ncmd` blocks of `3 x K_total` goal-position
/// trajectories, no header.
pub fn write_goal_file(path: impl AsRef<Path>, goal_trajectories: &[Vec<Point3>]) -> io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    for trajectory in goal_trajectories {
        write_block(&mut f, trajectory)?;
    }
    Ok(())
}

/// The header fields of the trajectory file, parsed back out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryHeader {
    pub n: usize,
    pub n_cmd: usize,
    pub p_min: Point3,
    pub p_max: Point3,
}

/// A fully parsed trajectory file: rewriting the output trajectory file and
/// re-reading it should reproduce the in-memory arrays exactly to text
/// precision.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryFile {
    pub header: TrajectoryHeader,
    pub po: Vec<Point3>,
    pub pf: Vec<Point3>,
    pub trajectories: Vec<Vec<Point3>>,
}

fn parse_row(line: &str) -> Result<Vec<Float>, io::Error> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<Float>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
        .collect()
}

fn read_block(lines: &mut std::vec::IntoIter<String>, count: usize) -> io::Result<Vec<Point3>> {
    let mut rows = Vec::with_capacity(3);
    for _ in 0..3 {
        let line = lines
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "missing block row"))?;
        rows.push(parse_row(&line)?);
    }
    let mut points = Vec::with_capacity(count);
    for i in 0..count {
        points.push([rows[0][i], rows[1][i], rows[2][i]]);
    }
    Ok(points)
}

/// Parses a trajectory file written by [`write_trajectory_file`].
pub fn read_trajectory_file(path: impl AsRef<Path>) -> io::Result<TrajectoryFile> {
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.lines().map(str::to_owned).collect::<Vec<_>>().into_iter();
    let header_line = lines
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "missing header line"))?;
    let header_values = parse_row(&header_line)?;
    if header_values.len() != 8 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "header must have 8 fields"));
    }
    let n = header_values[0] as usize;
    let n_cmd = header_values[1] as usize;
    let header = TrajectoryHeader {
        n,
        n_cmd,
        p_min: [header_values[2], header_values[3], header_values[4]],
        p_max: [header_values[5], header_values[6], header_values[7]],
    };

    let po = read_block(&mut lines, n)?;
    let pf = read_block(&mut lines, n_cmd)?;

    let mut trajectories = Vec::with_capacity(n_cmd);
    let remaining: Vec<String> = lines.collect();
    let mut remaining = remaining.into_iter();
    // Each trajectory block has the same number of rows (3) but an
    // a-priori unknown column count (`K_total`); infer it from the first
    // block and assume every subsequent block matches.
    let mut k_total = None;
    for _ in 0..n_cmd {
        let mut rows = Vec::with_capacity(3);
        for _ in 0..3 {
            let line = remaining
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "missing trajectory row"))?;
            rows.push(parse_row(&line)?);
        }
        let k = *k_total.get_or_insert(rows[0].len());
        let mut points = Vec::with_capacity(k);
        for i in 0..k {
            points.push([rows[0][i], rows[1][i], rows[2][i]]);
        }
        trajectories.push(points);
    }

    Ok(TrajectoryFile {
        header,
        po,
        pf,
        trajectories,
    })
}

/// The append-only reallocation CSV log, flushed after each event.
#[derive(Debug)]
pub struct ReallocationLog {
    writer: csv::Writer<std::fs::File>,
}

impl ReallocationLog {
    /// Creates (or truncates) the log file and writes its header.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(csv_err_to_io)?;
        writer
            .write_record([
                "timestamp",
                "reallocation_id",
                "agent_id",
                "old_goal",
                "new_goal",
                "distance",
                "method",
            ])
            .map_err(csv_err_to_io)?;
        Ok(Self { writer })
    }

    /// Appends every change from one reallocation event and flushes.
    pub fn log_event(
        &mut self,
        t: Float,
        reallocation_id: u64,
        mode: ReallocationMode,
        changes: &[AssignmentChange],
    ) -> io::Result<()> {
        let method = match mode {
            ReallocationMode::Reactive => "reactive",
            ReallocationMode::Predictive => "predictive",
        };
        for change in changes {
            self.writer
                .write_record([
                    t.to_string(),
                    reallocation_id.to_string(),
                    change.agent.to_string(),
                    change.old_goal.to_string(),
                    change.new_goal.to_string(),
                    change.distance.to_string(),
                    method.to_string(),
                ])
                .map_err(csv_err_to_io)?;
        }
        self.writer.flush()
    }
}

fn csv_err_to_io(e: csv::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_round_trip_reproduces_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.txt");
        let po = vec![[0.0, 0.0, 1.0], [4.0, 0.0, 1.0]];
        let pf = vec![[4.0, 0.0, 1.0], [0.0, 0.0, 1.0]];
        let trajectories = vec![
            vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [2.0, 0.0, 1.0]],
            vec![[4.0, 0.0, 1.0], [3.0, 0.0, 1.0], [2.0, 0.0, 1.0]],
        ];
        write_trajectory_file(
            &path,
            2,
            2,
            [-10.0, -10.0, 0.0],
            [10.0, 10.0, 5.0],
            &po,
            &pf,
            &trajectories,
        )
        .unwrap();

        let parsed = read_trajectory_file(&path).unwrap();
        assert_eq!(parsed.header.n, 2);
        assert_eq!(parsed.header.n_cmd, 2);
        assert_eq!(parsed.po, po);
        assert_eq!(parsed.pf, pf);
        assert_eq!(parsed.trajectories, trajectories);
    }

    #[test]
    fn reallocation_log_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("realloc.csv");
        let mut log = ReallocationLog::create(&path).unwrap();
        log.log_event(
            2.0,
            0,
            ReallocationMode::Reactive,
            &[AssignmentChange {
                agent: 0,
                old_goal: 0,
                new_goal: 1,
                distance: 1.5,
            }],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,reallocation_id,agent_id,old_goal,new_goal,distance,method"
        );
        assert_eq!(lines.next().unwrap(), "2,0,0,0,1,1.5,reactive");
    }
}
