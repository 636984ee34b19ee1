//! Pure tic-tac-toe rules: turn derivation, move legality, and terminal
//! detection over the 8 canonical lines.

use gridstake_types::board::{Board, Mark, LINES};
use tracing::debug;

use crate::EngineError;

/// Outcome of evaluating a board position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardOutcome {
    /// Play continues.
    Open,
    /// A line is complete.
    Won { mark: Mark, line: [u8; 3] },
    /// All nine cells occupied, no winner.
    Draw,
}

impl BoardOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// The mark whose turn it is. X opens, so X is to move whenever the counts
/// are level; strict alternation follows.
pub fn to_move(board: &Board) -> Mark {
    if board.count(Mark::X) <= board.count(Mark::O) {
        Mark::X
    } else {
        Mark::O
    }
}

/// Validate and apply a move.
///
/// Fails with `InvalidMove` when `cell` is outside [0,8], the cell is
/// occupied, or it is not `mark`'s turn. The board is untouched on failure.
pub fn apply_move(board: &mut Board, cell: u8, mark: Mark) -> Result<(), EngineError> {
    if cell > 8 {
        debug!(cell, "move rejected: cell out of range");
        return Err(EngineError::InvalidMove { cell });
    }
    if board.get(cell).is_some() {
        debug!(cell, "move rejected: cell occupied");
        return Err(EngineError::InvalidMove { cell });
    }
    if to_move(board) != mark {
        debug!(cell, ?mark, "move rejected: out of turn");
        return Err(EngineError::InvalidMove { cell });
    }
    board.set(cell, mark);
    Ok(())
}

/// Scan the 8 canonical lines. A line wins when all three cells hold the
/// same mark; a draw is declared only on a full board with no winner.
pub fn detect_outcome(board: &Board) -> BoardOutcome {
    for line in LINES {
        let [a, b, c] = line;
        if let Some(mark) = board.get(a) {
            if board.get(b) == Some(mark) && board.get(c) == Some(mark) {
                return BoardOutcome::Won { mark, line };
            }
        }
    }
    if board.is_full() {
        BoardOutcome::Draw
    } else {
        BoardOutcome::Open
    }
}

/// The cell that completes three-in-a-row for `mark`, if one exists.
/// Returns the first such cell in canonical line order.
pub fn completing_cell(board: &Board, mark: Mark) -> Option<u8> {
    for line in LINES {
        let mut owned = 0;
        let mut empty = None;
        for cell in line {
            match board.get(cell) {
                Some(m) if m == mark => owned += 1,
                None => empty = Some(cell),
                Some(_) => {}
            }
        }
        if owned == 2 {
            if let Some(cell) = empty {
                return Some(cell);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(moves: &[(u8, Mark)]) -> Board {
        let mut board = Board::new();
        for (cell, mark) in moves {
            board.set(*cell, *mark);
        }
        board
    }

    #[test]
    fn test_x_moves_first() {
        let board = Board::new();
        assert_eq!(to_move(&board), Mark::X);
    }

    #[test]
    fn test_alternation_enforced() {
        let mut board = Board::new();
        apply_move(&mut board, 0, Mark::X).expect("first move failed");

        // X cannot move twice in a row.
        assert_eq!(
            apply_move(&mut board, 1, Mark::X),
            Err(EngineError::InvalidMove { cell: 1 })
        );
        apply_move(&mut board, 1, Mark::O).expect("second move failed");
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let mut board = Board::new();
        apply_move(&mut board, 4, Mark::X).expect("move failed");

        assert_eq!(
            apply_move(&mut board, 4, Mark::O),
            Err(EngineError::InvalidMove { cell: 4 })
        );
        // Board unchanged by the rejection.
        assert_eq!(board.get(4), Some(Mark::X));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut board = Board::new();
        assert_eq!(
            apply_move(&mut board, 9, Mark::X),
            Err(EngineError::InvalidMove { cell: 9 })
        );
    }

    #[test]
    fn test_win_detection_all_lines() {
        for line in LINES {
            let mut board = Board::new();
            for cell in line {
                board.set(cell, Mark::X);
            }
            assert_eq!(
                detect_outcome(&board),
                BoardOutcome::Won {
                    mark: Mark::X,
                    line
                }
            );
        }
    }

    #[test]
    fn test_draw_requires_full_board() {
        // X O X / X O O / O X X: full, no line.
        let board = board_from(&[
            (0, Mark::X),
            (1, Mark::O),
            (2, Mark::X),
            (3, Mark::X),
            (4, Mark::O),
            (5, Mark::O),
            (6, Mark::O),
            (7, Mark::X),
            (8, Mark::X),
        ]);
        assert_eq!(detect_outcome(&board), BoardOutcome::Draw);

        // Same position with the last cell open is not a draw.
        let partial = board_from(&[
            (0, Mark::X),
            (1, Mark::O),
            (2, Mark::X),
            (3, Mark::X),
            (4, Mark::O),
            (5, Mark::O),
            (6, Mark::O),
            (7, Mark::X),
        ]);
        assert_eq!(detect_outcome(&partial), BoardOutcome::Open);
    }

    #[test]
    fn test_single_winning_line_under_alternation() {
        // Play a legal game to completion and confirm only one line is ever
        // reported once the outcome is terminal.
        let mut board = Board::new();
        let script = [(0, Mark::X), (3, Mark::O), (1, Mark::X), (4, Mark::O), (2, Mark::X)];
        for (cell, mark) in script {
            apply_move(&mut board, cell, mark).expect("scripted move failed");
        }

        let winning: Vec<_> = LINES
            .iter()
            .filter(|line| line.iter().all(|c| board.get(*c) == Some(Mark::X)))
            .collect();
        assert_eq!(winning.len(), 1);
        assert_eq!(
            detect_outcome(&board),
            BoardOutcome::Won {
                mark: Mark::X,
                line: [0, 1, 2]
            }
        );
    }

    #[test]
    fn test_completing_cell() {
        let board = board_from(&[(0, Mark::X), (1, Mark::X), (4, Mark::O)]);
        assert_eq!(completing_cell(&board, Mark::X), Some(2));
        assert_eq!(completing_cell(&board, Mark::O), None);
    }

    #[test]
    fn test_completing_cell_ignores_blocked_lines() {
        // X X O on the top row: nothing to complete there.
        let board = board_from(&[(0, Mark::X), (1, Mark::X), (2, Mark::O)]);
        assert_eq!(completing_cell(&board, Mark::X), None);
    }
}
