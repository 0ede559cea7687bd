mod common;

use common::*;
use hazard_sim_core::board::{Board, Config};
use hazard_sim_core::registers::Specifier;

const BLOCK: u32 = 0x0000_2033;
const UNBLOCK: u32 = 0x0010_2033;

/// Build a board with 4 KiB of RAM, loading each `(address, words)` chunk.
fn board(harts: u32, chunks: &[(u32, &[u32])]) -> Board<Vec<u8>> {
    let mut image = vec![0u8; 0x200];
    for &(address, words) in chunks {
        for (i, word) in words.iter().enumerate() {
            let offset = address as usize + 4 * i;
            image[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
        }
    }
    let mut board = Board::new(
        Config {
            ram_size: 0x1000,
            harts,
            ..Config::default()
        },
        Vec::new(),
        false,
    )
    .unwrap();
    board.load_binary(&image).unwrap();
    board
}

fn x(board: &Board<Vec<u8>>, hart: usize, index: u32) -> u32 {
    board.harts()[hart]
        .registers()
        .x(Specifier::new(index).unwrap())
}

#[test]
fn exit_with_code() {
    let mut board = board(
        1,
        &[(
            0x40,
            &[
                lui(T0, 0x80000),
                addi(T1, ZERO, 'o' as i32),
                sw(T1, T0, 0),
                sw(T1, T0, 4),
                addi(T1, ZERO, 123),
                sw(T1, T0, 8),
                spin(),
            ],
        )],
    );
    let mut cycles = 0;
    while board.exit_code().is_none() && cycles < 100 {
        board.step();
        cycles += 1;
    }
    assert_eq!(Some(123), board.exit_code());
    assert_eq!(6, cycles);
    assert_eq!(b"o0000006f\n", board.io().output().as_slice());
}

/// Hart 0 takes a reservation, then stores to it itself before trying sc.w. Hart 1, if present,
/// stores its hart ID to the reserved word in between.
fn lr_sc(harts: u32) -> Board<Vec<u8>> {
    let mut board = board(
        harts,
        &[
            (
                0x40,
                &[
                    addi(T0, ZERO, 0x100),
                    csrr(A0, MHARTID),
                    bne(A0, ZERO, 0x18),
                    lr_w(A1, T0),
                    sw(A1, T0, 0),
                    sc_w(A2, T0, T0),
                    spin(),
                ],
            ),
            (0x60, &[addi(ZERO, ZERO, 0), sw(A0, T0, 0), spin()]),
        ],
    );
    for _ in 0..8 {
        board.step();
    }
    board
}

#[test]
fn store_by_other_hart_breaks_reservation() {
    let mut single = lr_sc(1);
    assert_eq!(0, x(&single, 0, A2));
    // sc.w stored t0 = 0x100.
    assert_eq!(0x00, single.read_byte(0x100));
    assert_eq!(0x01, single.read_byte(0x101));

    let mut dual = lr_sc(2);
    assert_eq!(1, x(&dual, 0, A2));
    assert_eq!(1, dual.read_byte(0x100));
    assert_eq!(None, dual.harts()[0].reservation());
}

#[test]
fn unblock_releases_other_hart() {
    let mut board = board(
        2,
        &[(
            0x40,
            &[
                csrr(A0, MHARTID),
                bne(A0, ZERO, 0x10),
                BLOCK,
                addi(A1, ZERO, 1),
                spin(),
                addi(ZERO, ZERO, 0),
                UNBLOCK,
                spin(),
            ],
        )],
    );
    for _ in 0..3 {
        board.step();
    }
    assert!(board.harts()[0].is_waiting());
    let steps = board.step();
    assert!(steps[0].stalled);
    assert!(steps[1].unblock);
    assert_eq!(0, x(&board, 0, A1));
    board.step();
    assert!(!board.harts()[0].is_waiting());
    assert_eq!(1, x(&board, 0, A1));
}

#[test]
fn timer_interrupt_wakes_wfi() {
    let mut board = board(
        1,
        &[
            (
                0x40,
                &[
                    // mtimecmp = 20
                    lui(T0, 0x80000),
                    addi(T1, ZERO, 20),
                    sw(T1, T0, 0x108),
                    addi(T1, ZERO, 0x80),
                    csrw(MIE, T1),
                    addi(T1, ZERO, 0x100),
                    csrw(MTVEC, T1),
                    csrrsi(ZERO, MSTATUS, 8),
                    0x1050_0073, // wfi
                    spin(),
                ],
            ),
            (0x100, &[csrr(A0, MCAUSE), spin()]),
        ],
    );
    let mut trap_cycle = None;
    for cycle in 0..40 {
        let steps = board.step();
        if let Some(trap) = steps[0].trap {
            assert_eq!(0x8000_0007, trap.mcause);
            assert_eq!(0x100, trap.target);
            trap_cycle = Some(cycle);
            break;
        }
    }
    // mtime reaches 20 after the 20th cycle.
    assert_eq!(Some(20), trap_cycle);
    assert_eq!(0x64, board.harts()[0].cs_registers().mepc());
    board.step();
    assert_eq!(0x8000_0007, x(&board, 0, A0));
}

#[test]
fn dump_reads_through_bus() {
    let mut board = board(1, &[(0x40, &[0x1122_3344])]);
    let mut out = Vec::new();
    board.dump(&mut out, 0x40, 0x44).unwrap();
    assert_eq!(
        "Dumping memory from 00000040 to 00000044:\n44 33 22 11 \n",
        String::from_utf8(out).unwrap()
    );
    // Unmapped bytes read as zero.
    assert_eq!(0, board.read_byte(0x4000_0000));
}
