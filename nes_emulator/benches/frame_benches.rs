use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use nes_emulator::components::cartridge::CHR_BANK_SIZE;
use nes_emulator::components::cartridge::PRG_BANK_SIZE;
use nes_emulator::debugger::EventFilter;
use nes_emulator::Nes;

/// NROM image that enables background rendering and NMI, then counts in a loop.
fn busy_rom() -> Vec<u8> {
    let mut prg = vec![0xEA; PRG_BANK_SIZE];
    let program = [
        0xA9, 0x80, 0x8D, 0x00, 0x20, // LDA #$80, STA $2000
        0xA9, 0x1E, 0x8D, 0x01, 0x20, // LDA #$1E, STA $2001
        0xE8, 0xC8, 0x4C, 0x0A, 0xC0, // INX, INY, JMP $C00A
    ];
    prg[..program.len()].copy_from_slice(&program);
    // NMI handler: RTI
    prg[0x3FF0] = 0x40;
    prg[0x3FFA..].copy_from_slice(&[0xF0, 0xFF, 0x00, 0xC0, 0xF0, 0xFF]);

    let chr = (0..CHR_BANK_SIZE).map(|i| (i * 7) as u8).collect::<Vec<u8>>();
    let mut data = b"NES\x1A\x01\x01\x00\x00".to_vec();
    data.resize(16, 0);
    data.extend(prg);
    data.extend(chr);
    data
}

fn criterion_benchmark(c: &mut Criterion) {
    let rom = busy_rom();

    c.bench_function("busy_frame_time", |b| {
        let mut nes = Nes::with_ines_data(&rom).unwrap();
        b.iter(|| nes.execute_frames(1));
    });

    c.bench_function("busy_frame_time_debugger", |b| {
        let mut nes = Nes::with_ines_data(&rom).unwrap();
        nes.debugger().enable();
        nes.debugger().add_log_point(EventFilter::Nmi);
        b.iter(|| nes.execute_frames(1));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
